/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use std::convert::Infallible;
use std::fs;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use indexmap::IndexMap;
use tracing::{debug, error, warn};

use crate::bus::frame::{
    decode_request, encode_response, read_frame, write_frame, RequestKind, ResponseKind,
};
use crate::bus::endpoint_path;
use crate::error::{Error, Result};
use crate::obj::{Arena, Map, Obj};

/// Opaque identifier for a core-bus call or subscription.
///
/// Minted by the transport, never zero. Subscription handles outlive the
/// originating request and stay valid for [`Notifier::sub_respond`] /
/// [`Notifier::sub_close`] until torn down.
pub type Handle = u32;

type CloseFn = Box<dyn FnOnce(Handle) + Send>;

/// One entry of a server's method table.
///
/// Method lookup is byte-exact; the table is fixed for the life of the
/// server.
pub struct Method<C> {
    pub name: &'static [u8],
    pub is_sub: bool,
    pub handler: fn(&C, Map<'_>, &Caller<'_>) -> Result<()>,
}

enum HandleState {
    /// Request received, no response sent yet.
    Pending,
    /// Subscription accepted; close callback runs exactly once.
    Accepted(Option<CloseFn>),
}

struct HandleEntry {
    conn: Arc<ConnShared>,
    state: HandleState,
}

struct ConnShared {
    writer: Mutex<UnixStream>,
    conn_id: u64,
}

struct ServerState {
    // Insertion order is kept so connection teardown closes subscriptions
    // in the order they were accepted.
    handles: Mutex<IndexMap<Handle, HandleEntry>>,
    next_handle: AtomicU32,
}

impl ServerState {
    fn mint(&self) -> Handle {
        loop {
            let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    fn send(conn: &ConnShared, kind: ResponseKind, err: Option<Error>, value: Obj<'_>) -> Result<()> {
        let mut payload = Vec::new();
        encode_response(kind, err, value, &mut payload)?;
        let mut writer = conn.writer.lock().unwrap();
        write_frame(&mut *writer, &payload)
    }

    fn sub_respond(&self, handle: Handle, value: Obj<'_>) -> Result<()> {
        let conn = {
            let handles = self.handles.lock().unwrap();
            let entry = handles.get(&handle).ok_or(Error::NoEntry)?;
            match entry.state {
                HandleState::Accepted(_) => entry.conn.clone(),
                HandleState::Pending => return Err(Error::Invalid),
            }
        };
        let ret = Self::send(&conn, ResponseKind::Push, None, value);
        if ret.is_err() {
            // Close callbacks may re-enter the caller's locks, so they must
            // not run on this thread. Shutting the socket down hands the
            // teardown to the connection worker, which runs them.
            debug!(handle, "push failed, shutting connection down");
            let writer = conn.writer.lock().unwrap();
            let _ = writer.shutdown(std::net::Shutdown::Both);
        }
        ret
    }

    fn sub_close(&self, handle: Handle) {
        let removed = {
            let mut handles = self.handles.lock().unwrap();
            handles.shift_remove(&handle)
        };
        if let Some(mut entry) = removed {
            let _ = Self::send(&entry.conn, ResponseKind::Closed, None, Obj::Null);
            if let HandleState::Accepted(cb) = &mut entry.state {
                if let Some(cb) = cb.take() {
                    cb(handle);
                }
            }
        }
    }

    /// Remove a handle without notifying the peer; runs the close callback.
    fn drop_handle(&self, handle: Handle) {
        let removed = {
            let mut handles = self.handles.lock().unwrap();
            handles.shift_remove(&handle)
        };
        if let Some(mut entry) = removed {
            if let HandleState::Accepted(cb) = &mut entry.state {
                if let Some(cb) = cb.take() {
                    cb(handle);
                }
            }
        }
    }

    /// Tear down every handle belonging to a dead connection.
    fn drop_conn(&self, conn_id: u64) {
        let mut closers: Vec<(Handle, CloseFn)> = Vec::new();
        {
            let mut handles = self.handles.lock().unwrap();
            handles.retain(|handle, entry| {
                if entry.conn.conn_id != conn_id {
                    return true;
                }
                if let HandleState::Accepted(cb) = &mut entry.state {
                    if let Some(cb) = cb.take() {
                        closers.push((*handle, cb));
                    }
                }
                false
            });
        }
        for (handle, cb) in closers {
            cb(handle);
        }
    }
}

/// Handed to method handlers for replying to the request in flight.
pub struct Caller<'s> {
    state: &'s Arc<ServerState>,
    conn: &'s Arc<ConnShared>,
    handle: Handle,
}

impl Caller<'_> {
    /// The request's handle. For subscriptions this may be retained (e.g.
    /// in a registry slot) and used with a [`Notifier`] later.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Send the single successful reply for a non-subscription call.
    ///
    /// Calling this twice, or after [`Caller::sub_accept`], is a
    /// programmer error and fails `Invalid`.
    pub fn respond(&self, value: Obj<'_>) -> Result<()> {
        {
            let mut handles = self.state.handles.lock().unwrap();
            match handles.get(&self.handle) {
                Some(entry) if matches!(entry.state, HandleState::Pending) => {}
                _ => {
                    debug_assert!(false, "respond on non-pending handle");
                    return Err(Error::Invalid);
                }
            }
            handles.shift_remove(&self.handle);
        }
        ServerState::send(self.conn, ResponseKind::Reply, None, value)
    }

    /// Accept the request as a subscription.
    ///
    /// The acceptance reply is sent to the client immediately; the server
    /// may then call `sub_respond` with this handle any number of times.
    /// `on_close` runs exactly once when either side tears the
    /// subscription down.
    pub fn sub_accept(&self, on_close: impl FnOnce(Handle) + Send + 'static) -> Result<()> {
        {
            let mut handles = self.state.handles.lock().unwrap();
            let entry = handles.get_mut(&self.handle).ok_or(Error::NoEntry)?;
            match entry.state {
                HandleState::Pending => {}
                HandleState::Accepted(_) => {
                    debug_assert!(false, "subscription accepted twice");
                    return Err(Error::Invalid);
                }
            }
            entry.state = HandleState::Accepted(Some(Box::new(on_close)));
        }
        ServerState::send(self.conn, ResponseKind::Reply, None, Obj::Null)
    }

    /// Push an update on an accepted subscription. Usable from within the
    /// accepting handler for early responses.
    pub fn sub_respond(&self, value: Obj<'_>) -> Result<()> {
        self.state.sub_respond(self.handle, value)
    }
}

/// Server half of a core-bus endpoint.
pub struct Server<C: 'static> {
    listener: UnixListener,
    methods: &'static [Method<C>],
    ctx: Arc<C>,
    state: Arc<ServerState>,
    endpoint: String,
}

/// Cloneable server handle for pushing to subscriptions from outside the
/// handler path (background threads, other subsystems).
#[derive(Clone)]
pub struct Notifier {
    state: Arc<ServerState>,
}

impl Notifier {
    pub fn sub_respond(&self, handle: Handle, value: Obj<'_>) -> Result<()> {
        self.state.sub_respond(handle, value)
    }

    pub fn sub_close(&self, handle: Handle) {
        self.state.sub_close(handle)
    }
}

impl<C: Send + Sync + 'static> Server<C> {
    /// Bind `endpoint` and register the method table. Stale sockets left
    /// by a previous instance are removed.
    pub fn new(endpoint: &str, methods: &'static [Method<C>], ctx: Arc<C>) -> Result<Server<C>> {
        let path = endpoint_path(endpoint);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::remove_file(&path) {
            Ok(()) => debug!(?path, "removed stale endpoint socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let listener = UnixListener::bind(&path)?;
        Ok(Server {
            listener,
            methods,
            ctx,
            state: Arc::new(ServerState {
                handles: Mutex::new(IndexMap::new()),
                next_handle: AtomicU32::new(1),
            }),
            endpoint: endpoint.to_owned(),
        })
    }

    pub fn notifier(&self) -> Notifier {
        Notifier {
            state: self.state.clone(),
        }
    }

    /// Serve requests forever. Each connection gets its own worker thread;
    /// handlers for distinct connections run concurrently.
    pub fn listen(&self) -> Result<Infallible> {
        static CONN_ID: AtomicU64 = AtomicU64::new(1);

        debug!(endpoint = %self.endpoint, "listening");
        loop {
            let (stream, _addr) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let conn_id = CONN_ID.fetch_add(1, Ordering::Relaxed);
            let writer = match stream.try_clone() {
                Ok(w) => w,
                Err(e) => {
                    warn!(error = %e, "failed to clone connection");
                    continue;
                }
            };
            let conn = Arc::new(ConnShared {
                writer: Mutex::new(writer),
                conn_id,
            });

            let methods = self.methods;
            let ctx = self.ctx.clone();
            let state = self.state.clone();
            let spawned = thread::Builder::new()
                .name("bus-worker".into())
                .spawn(move || {
                    serve_conn(stream, conn, methods, ctx, &state);
                });
            if let Err(e) = spawned {
                error!(error = %e, "failed to spawn bus worker");
            }
        }
    }
}

const SERVER_ARENA_LEN: usize = 32 * 1024;

fn serve_conn<C>(
    mut stream: UnixStream,
    conn: Arc<ConnShared>,
    methods: &[Method<C>],
    ctx: Arc<C>,
    state: &Arc<ServerState>,
) {
    let mut frame_buf = Vec::new();
    let mut arena_mem = vec![0u8; SERVER_ARENA_LEN];

    loop {
        if let Err(e) = read_frame(&mut stream, &mut frame_buf) {
            debug!(error = %e, "connection closed");
            break;
        }

        let arena = Arena::new(&mut arena_mem);
        let req = match decode_request(&frame_buf, &arena) {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, "bad request frame");
                let _ = ServerState::send(&conn, ResponseKind::Reply, Some(e), Obj::Null);
                continue;
            }
        };

        let params = match req.params {
            Obj::Map(pairs) => pairs,
            _ => {
                debug!("request params not a map");
                let _ =
                    ServerState::send(&conn, ResponseKind::Reply, Some(Error::Invalid), Obj::Null);
                continue;
            }
        };

        let method = methods.iter().find(|m| m.name == req.method);
        let method = match method {
            Some(m) => m,
            None => {
                debug!(
                    method = %String::from_utf8_lossy(req.method),
                    "unknown method"
                );
                let _ =
                    ServerState::send(&conn, ResponseKind::Reply, Some(Error::NoEntry), Obj::Null);
                continue;
            }
        };
        let expected_kind = if method.is_sub {
            RequestKind::Sub
        } else {
            RequestKind::Call
        };
        if req.kind != expected_kind {
            let _ = ServerState::send(&conn, ResponseKind::Reply, Some(Error::Invalid), Obj::Null);
            continue;
        }

        let handle = state.mint();
        {
            let mut handles = state.handles.lock().unwrap();
            handles.insert(
                handle,
                HandleEntry {
                    conn: conn.clone(),
                    state: HandleState::Pending,
                },
            );
        }

        let caller = Caller {
            state,
            conn: &conn,
            handle,
        };
        let result = (method.handler)(&ctx, params, &caller);

        let pending = {
            let handles = state.handles.lock().unwrap();
            handles
                .get(&handle)
                .map(|e| matches!(e.state, HandleState::Pending))
        };
        match (result, pending) {
            (Ok(()), Some(true)) => {
                debug_assert!(false, "handler succeeded without responding");
                state.drop_handle(handle);
                let _ =
                    ServerState::send(&conn, ResponseKind::Reply, Some(Error::Failure), Obj::Null);
            }
            (Err(err), Some(true)) => {
                state.drop_handle(handle);
                let _ = ServerState::send(&conn, ResponseKind::Reply, Some(err), Obj::Null);
            }
            (Err(err), Some(false)) => {
                warn!(handle, error = %err, "handler error after accepting subscription");
            }
            _ => {}
        }
    }

    state.drop_conn(conn.conn_id);
}

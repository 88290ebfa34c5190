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
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::bus::endpoint_path;
use crate::bus::frame::{
    decode_response, encode_request, read_frame, write_frame, RequestKind, ResponseKind,
};
use crate::error::{Error, Result};
use crate::obj::{deep_copy, Arena, Obj};

const CLIENT_ARENA_LEN: usize = 32 * 1024;

/// Client connection to a core-bus endpoint.
///
/// A connection serves one call at a time; concurrent calls need separate
/// connections. Subscriptions consume the connection (see [`subscribe`]).
pub struct Conn {
    stream: UnixStream,
}

impl Conn {
    pub fn connect(endpoint: &str) -> Result<Conn> {
        let path = endpoint_path(endpoint);
        let stream = UnixStream::connect(&path).map_err(|e| {
            debug!(?path, error = %e, "failed to connect to endpoint");
            Error::NoConn
        })?;
        Ok(Conn { stream })
    }

    /// Issue a call and await the reply.
    ///
    /// The result's transitive storage is copied into `arena`, so it stays
    /// valid after the connection's receive buffer is reused.
    pub fn call<'a>(&mut self, method: &[u8], params: Obj<'_>, arena: &Arena<'a>) -> Result<Obj<'a>> {
        self.call_inner(method, params, arena)
    }

    /// [`Conn::call`] with a deadline on the reply.
    ///
    /// Expiry surfaces as `Busy` without cancelling the server-side work;
    /// the server discovers the broken handle on its next respond. The
    /// connection must not be reused after a timeout (a late reply would
    /// desynchronise it).
    pub fn call_timeout<'a>(
        &mut self,
        method: &[u8],
        params: Obj<'_>,
        arena: &Arena<'a>,
        timeout: Duration,
    ) -> Result<Obj<'a>> {
        self.stream.set_read_timeout(Some(timeout))?;
        let ret = self.call_inner(method, params, arena);
        let _ = self.stream.set_read_timeout(None);
        ret
    }

    fn call_inner<'a>(
        &mut self,
        method: &[u8],
        params: Obj<'_>,
        arena: &Arena<'a>,
    ) -> Result<Obj<'a>> {
        let mut payload = Vec::new();
        encode_request(RequestKind::Call, method, params, &mut payload)?;
        write_frame(&mut self.stream, &payload)?;

        let mut frame_buf = Vec::new();
        read_frame(&mut self.stream, &mut frame_buf)?;

        let mut scratch = vec![0u8; CLIENT_ARENA_LEN];
        let scratch_arena = Arena::new(&mut scratch);
        let resp = decode_response(&frame_buf, &scratch_arena)?;
        if resp.kind != ResponseKind::Reply {
            return Err(Error::Failure);
        }
        if let Some(err) = resp.error {
            return Err(err);
        }
        deep_copy(resp.value, arena)
    }
}

/// Client half of a subscription: a stream of pushed messages terminated
/// by a close event.
///
/// Dropping it closes the handle; the server's close callback then runs on
/// its side, and `on_close` runs here (exactly once, whichever side
/// initiated).
pub struct Subscription {
    stream: UnixStream,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Open a subscription on `endpoint`.
///
/// Blocks until the server accepts (or rejects) the request, then delivers
/// pushes to `on_push` on a dedicated reader thread, in the order the
/// server sent them.
pub fn subscribe(
    endpoint: &str,
    method: &[u8],
    params: Obj<'_>,
    mut on_push: impl FnMut(Obj<'_>) + Send + 'static,
    on_close: impl FnOnce() + Send + 'static,
) -> Result<Subscription> {
    let conn = Conn::connect(endpoint)?;
    let mut stream = conn.stream;

    let mut payload = Vec::new();
    encode_request(RequestKind::Sub, method, params, &mut payload)?;
    write_frame(&mut stream, &payload)?;

    // The acceptance reply comes before any push.
    let mut frame_buf = Vec::new();
    read_frame(&mut stream, &mut frame_buf)?;
    {
        let mut scratch = vec![0u8; CLIENT_ARENA_LEN];
        let scratch_arena = Arena::new(&mut scratch);
        let resp = decode_response(&frame_buf, &scratch_arena)?;
        if resp.kind != ResponseKind::Reply {
            return Err(Error::Failure);
        }
        if let Some(err) = resp.error {
            return Err(err);
        }
    }

    let mut reader = stream.try_clone()?;
    let thread = thread::Builder::new()
        .name("bus-sub".into())
        .spawn(move || {
            let mut frame_buf = Vec::new();
            let mut scratch = vec![0u8; CLIENT_ARENA_LEN];
            loop {
                if read_frame(&mut reader, &mut frame_buf).is_err() {
                    break;
                }
                let arena = Arena::new(&mut scratch);
                let resp = match decode_response(&frame_buf, &arena) {
                    Ok(resp) => resp,
                    Err(e) => {
                        debug!(error = %e, "bad push frame");
                        break;
                    }
                };
                match resp.kind {
                    ResponseKind::Push => on_push(resp.value),
                    ResponseKind::Closed => break,
                    ResponseKind::Reply => {
                        debug!("unexpected reply on established subscription");
                        break;
                    }
                }
            }
            on_close();
        })
        .map_err(|_| Error::Failure)?;

    Ok(Subscription {
        stream,
        thread: Some(thread),
    })
}

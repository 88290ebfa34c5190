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
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use derive_builder::Builder;
use getset::{CopyGetters, Getters};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::mqtt::packet::{
    encode_packet_id_only, encode_pingreq, parse_packet, read_remaining_length, set_dup_flag,
    AckKind, Connect, Packet, Publish, Qos, SubEntry, Subscribe, Unsubscribe,
    MAX_INBOUND_PACKET_LEN,
};
use crate::mqtt::store::UnackedStore;
use crate::mqtt::transport::TlsLink;
use crate::obj::HashSet;

/// Keep-alive interval sent in CONNECT when the config leaves it default.
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 30;

/// How long to wait for CONNACK after sending CONNECT.
pub const CONNACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest filter batch for one SUBSCRIBE/UNSUBSCRIBE packet.
pub const MAX_SUBSCRIBE_FILTERS: usize = 10;

const BACKOFF_MIN: Duration = Duration::from_millis(10);
const BACKOFF_MAX: Duration = Duration::from_secs(10);

/// Broker connection parameters.
#[derive(Debug, Clone, Builder, Getters, CopyGetters)]
#[builder(setter(into))]
pub struct SessionConfig {
    /// Broker hostname; also the SNI name.
    #[getset(get = "pub")]
    endpoint: String,
    /// MQTT client identifier.
    #[getset(get = "pub")]
    client_id: String,
    #[getset(get = "pub")]
    root_ca: PathBuf,
    #[getset(get = "pub")]
    cert: PathBuf,
    #[getset(get = "pub")]
    key: PathBuf,
    #[builder(default = "DEFAULT_KEEP_ALIVE_SECS")]
    #[getset(get_copy = "pub")]
    keep_alive: u16,
    #[builder(default)]
    #[getset(get = "pub")]
    proxy_uri: Option<String>,
    #[builder(default)]
    #[getset(get = "pub")]
    no_proxy: Option<String>,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Inbound publish delivery: `(topic, payload)`.
pub type MessageFn = Box<dyn Fn(&[u8], &[u8]) + Send + Sync>;
/// Connection status transition.
pub type StatusFn = Box<dyn Fn(bool) + Send + Sync>;
/// Runs on each fresh broker session, before the session is marked
/// connected; used to replay the subscription registry.
pub type ConnectFn = Box<dyn Fn(&Session) + Send + Sync>;

struct PacketIdPool {
    next: u16,
    in_flight: HashSet<u16>,
}

impl PacketIdPool {
    fn new() -> Self {
        PacketIdPool {
            next: 1,
            in_flight: HashSet::new(),
        }
    }

    fn alloc(&mut self) -> Result<u16> {
        for _ in 0..u16::MAX {
            let id = self.next;
            self.next = self.next.checked_add(1).unwrap_or(1);
            if self.in_flight.insert(id) {
                return Ok(id);
            }
        }
        error!("packet ids exhausted");
        Err(Error::NoMem)
    }

    fn release(&mut self, id: u16) {
        self.in_flight.remove(&id);
    }
}

struct ProtocolState {
    ids: PacketIdPool,
    store: UnackedStore,
}

impl ProtocolState {
    /// Release ids whose exchange died with the old session; ids pinned by
    /// the unacked store stay reserved for retransmission.
    fn release_unpinned_ids(&mut self) {
        let store = &self.store;
        self.ids.in_flight.retain(|id| store.contains(*id));
    }
}

struct SessionInner {
    config: SessionConfig,
    link: RwLock<Option<Arc<TlsLink>>>,
    connected: AtomicBool,
    ping_pending: AtomicBool,
    // Serialises socket writes across the publisher, keep-alive and
    // reconnect paths.
    send_mtx: Mutex<()>,
    state: Mutex<ProtocolState>,
    on_message: MessageFn,
    on_status: StatusFn,
    on_connect: ConnectFn,
}

/// Persistent MQTT 3.1.1 client session.
///
/// Owns two background threads: the receive loop (which also performs
/// connection backoff and reconnect) and the keep-alive pinger. All
/// publishes share the one connection; disconnects are reported through
/// the status callback rather than to publish callers.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Start the session threads. Returns immediately; the first
    /// connection attempt happens on the receive thread.
    pub fn start(
        config: SessionConfig,
        on_message: MessageFn,
        on_status: StatusFn,
        on_connect: ConnectFn,
    ) -> Result<Session> {
        let inner = Arc::new(SessionInner {
            config,
            link: RwLock::new(None),
            connected: AtomicBool::new(false),
            ping_pending: AtomicBool::new(false),
            send_mtx: Mutex::new(()),
            state: Mutex::new(ProtocolState {
                ids: PacketIdPool::new(),
                store: UnackedStore::new(),
            }),
            on_message,
            on_status,
            on_connect,
        });

        let recv_inner = inner.clone();
        thread::Builder::new()
            .name("mqtt-recv".into())
            .spawn(move || recv_thread(recv_inner))
            .map_err(|_| Error::Fatal)?;

        let ka_inner = inner.clone();
        thread::Builder::new()
            .name("mqtt-keepalive".into())
            .spawn(move || keepalive_thread(ka_inner))
            .map_err(|_| Error::Fatal)?;

        Ok(Session { inner })
    }

    pub fn connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Publish `payload` on `topic`.
    ///
    /// QoS > 0 packets are recorded in the unacked store before the send,
    /// so a send that dies mid-connection is retransmitted after
    /// reconnect. Publishing while disconnected fails `Failure`.
    pub fn publish(&self, topic: &[u8], payload: &[u8], qos: Qos) -> Result<()> {
        if !self.connected() {
            debug!("publish while disconnected");
            return Err(Error::Failure);
        }

        if qos == Qos::AtMostOnce {
            let packet = Publish::builder()
                .topic(topic)
                .qos(qos)
                .payload(payload)
                .build()?;
            self.send_bytes(&packet.to_bytes())?;
        } else {
            let bytes = {
                let mut state = self.inner.state.lock().unwrap();
                let packet_id = state.ids.alloc()?;
                let packet = Publish::builder()
                    .topic(topic)
                    .qos(qos)
                    .packet_id(packet_id)
                    .payload(payload)
                    .build()?;
                let bytes = packet.to_bytes();
                if let Err(e) = state.store.store(packet_id, &bytes) {
                    state.ids.release(packet_id);
                    return Err(e);
                }
                bytes
            };
            self.send_bytes(&bytes)?;
        }

        debug!(topic = %String::from_utf8_lossy(topic), %qos, "publish sent");
        Ok(())
    }

    /// Subscribe a batch of 1..=[`MAX_SUBSCRIBE_FILTERS`] filters with one
    /// SUBSCRIBE packet.
    pub fn subscribe(&self, filters: &[&[u8]], qos: Qos) -> Result<()> {
        if filters.is_empty() || filters.len() > MAX_SUBSCRIBE_FILTERS {
            return Err(Error::Invalid);
        }
        let entries = filters
            .iter()
            .map(|f| SubEntry {
                filter: f.to_vec(),
                qos,
            })
            .collect();

        let packet_id = self.inner.state.lock().unwrap().ids.alloc()?;
        let packet = Subscribe::new(packet_id, entries)?;
        let ret = self.send_bytes(&packet.to_bytes());
        match ret {
            Ok(()) => {
                debug!(
                    filter = %String::from_utf8_lossy(filters[0]),
                    "subscribe sent"
                );
                Ok(())
            }
            Err(e) => {
                self.inner.state.lock().unwrap().ids.release(packet_id);
                error!(
                    filter = %String::from_utf8_lossy(filters[0]),
                    error = %e,
                    "subscribe failed"
                );
                Err(Error::Failure)
            }
        }
    }

    /// Unsubscribe a batch of filters with one UNSUBSCRIBE packet.
    pub fn unsubscribe(&self, filters: &[&[u8]]) -> Result<()> {
        if filters.is_empty() || filters.len() > MAX_SUBSCRIBE_FILTERS {
            return Err(Error::Invalid);
        }
        let filters_owned = filters.iter().map(|f| f.to_vec()).collect();

        let packet_id = self.inner.state.lock().unwrap().ids.alloc()?;
        let packet = Unsubscribe::new(packet_id, filters_owned)?;
        let ret = self.send_bytes(&packet.to_bytes());
        match ret {
            Ok(()) => {
                debug!(
                    filter = %String::from_utf8_lossy(filters[0]),
                    "unsubscribe sent"
                );
                Ok(())
            }
            Err(e) => {
                self.inner.state.lock().unwrap().ids.release(packet_id);
                error!(
                    filter = %String::from_utf8_lossy(filters[0]),
                    error = %e,
                    "unsubscribe failed"
                );
                Err(Error::Failure)
            }
        }
    }

    fn send_bytes(&self, bytes: &[u8]) -> Result<()> {
        send_on_current_link(&self.inner, bytes)
    }
}

fn send_on_current_link(inner: &SessionInner, bytes: &[u8]) -> Result<()> {
    let link = inner
        .link
        .read()
        .unwrap()
        .clone()
        .ok_or(Error::NoConn)?;
    let _guard = inner.send_mtx.lock().unwrap();
    link.write_all(bytes)
}

fn force_disconnect(inner: &SessionInner) {
    let link = inner.link.read().unwrap().clone();
    if let Some(link) = link {
        link.shutdown();
    }
}

/// Connect, then read packets until the transport dies; repeat with
/// exponential backoff between 10 ms and 10 s, indefinitely.
fn recv_thread(inner: Arc<SessionInner>) {
    let session = Session {
        inner: inner.clone(),
    };
    let mut backoff = BACKOFF_MIN;

    loop {
        let link = loop {
            match establish(&inner) {
                Ok(link) => break link,
                Err(e) => {
                    error!(error = %e, "failed to establish connection");
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
            }
        };
        backoff = BACKOFF_MIN;

        *inner.link.write().unwrap() = Some(link.clone());

        // Replay subscriptions and retransmit unacked publishes before
        // announcing the connection, so a publisher unblocked by the
        // status update cannot overtake its own subscriptions.
        retransmit_unacked(&inner, &link);
        (inner.on_connect)(&session);

        inner.connected.store(true, Ordering::Release);
        (inner.on_status)(true);
        info!("connected to the broker");

        loop {
            let result = read_raw_packet(&link).and_then(|(first, body)| {
                handle_packet(&inner, first, &body)
            });
            if let Err(e) = result {
                error!(error = %e, "error in receive loop, closing connection");
                break;
            }
        }

        inner.connected.store(false, Ordering::Release);
        link.shutdown();
        *inner.link.write().unwrap() = None;
        (inner.on_status)(false);
    }
}

/// Sleep the keep-alive period, then ping; an unanswered previous ping
/// force-closes the socket and lets the receive loop reconnect.
fn keepalive_thread(inner: Arc<SessionInner>) {
    let keep_alive = Duration::from_secs(u64::from(inner.config.keep_alive()));
    loop {
        thread::sleep(keep_alive);
        if !inner.connected.load(Ordering::Acquire) {
            continue;
        }

        if inner.ping_pending.load(Ordering::Acquire) {
            error!("server did not respond to ping within keep alive period");
            force_disconnect(&inner);
        } else {
            debug!("sending pingreq");
            inner.ping_pending.store(true, Ordering::Release);
            if let Err(e) = send_on_current_link(&inner, &encode_pingreq()) {
                error!(error = %e, "sending pingreq failed");
                force_disconnect(&inner);
            }
        }
    }
}

fn establish(inner: &SessionInner) -> Result<Arc<TlsLink>> {
    debug!("trying to establish connection to the broker");

    let link = TlsLink::connect(&inner.config)?;

    if inner.config.client_id().len() > u16::MAX as usize {
        error!("client id too long");
        return Err(Error::Config);
    }
    let connect = Connect::builder()
        .client_id(inner.config.client_id().as_bytes())
        .keep_alive(inner.config.keep_alive())
        .clean_session(true)
        .build()?;
    link.write_all(&connect.to_bytes())?;

    link.set_read_timeout(Some(CONNACK_TIMEOUT))?;
    let (first, body) = read_raw_packet(&link)?;
    link.set_read_timeout(None)?;

    match parse_packet(first, &body)? {
        Packet::Connack(connack) if connack.accepted() => {}
        Packet::Connack(connack) => {
            error!(code = ?connack.return_code(), "broker refused connection");
            return Err(Error::Remote);
        }
        _ => {
            error!("expected CONNACK");
            return Err(Error::Parse);
        }
    }

    inner.ping_pending.store(false, Ordering::Release);
    inner.state.lock().unwrap().release_unpinned_ids();

    debug!("MQTT session established");
    Ok(link)
}

fn read_raw_packet(link: &TlsLink) -> Result<(u8, Vec<u8>)> {
    let mut first = [0u8; 1];
    link.read_exact(&mut first)?;

    let mut reader = link;
    let len = read_remaining_length(&mut reader)? as usize;
    if len > MAX_INBOUND_PACKET_LEN {
        error!(len, "inbound packet exceeds network buffer");
        return Err(Error::NoMem);
    }

    let mut body = vec![0u8; len];
    link.read_exact(&mut body)?;
    Ok((first[0], body))
}

fn handle_packet(inner: &SessionInner, first: u8, body: &[u8]) -> Result<()> {
    match parse_packet(first, body)? {
        Packet::Publish(publish) => {
            debug!(
                id = publish.packet_id().unwrap_or(0),
                topic = %String::from_utf8_lossy(publish.topic()),
                "received publish"
            );
            (inner.on_message)(publish.topic(), publish.payload());
            match publish.qos() {
                Qos::AtMostOnce => {}
                Qos::AtLeastOnce => {
                    let id = publish.packet_id().ok_or(Error::Parse)?;
                    send_on_current_link(inner, &encode_packet_id_only(AckKind::Puback, id))?;
                }
                Qos::ExactlyOnce => {
                    let id = publish.packet_id().ok_or(Error::Parse)?;
                    send_on_current_link(inner, &encode_packet_id_only(AckKind::Pubrec, id))?;
                }
            }
        }
        Packet::Puback { packet_id } => {
            debug!(packet_id, "received puback");
            let mut state = inner.state.lock().unwrap();
            if state.store.clear(packet_id) {
                state.ids.release(packet_id);
            }
        }
        Packet::Pubrec { packet_id } => {
            debug!(packet_id, "received pubrec");
            let pubrel = encode_packet_id_only(AckKind::Pubrel, packet_id);
            {
                // The stored PUBLISH must not be retransmitted past its
                // PUBREC; park the PUBREL under the same id instead.
                let mut state = inner.state.lock().unwrap();
                state.store.clear(packet_id);
                if let Err(e) = state.store.store(packet_id, &pubrel) {
                    warn!(packet_id, error = %e, "failed to store pubrel");
                }
            }
            send_on_current_link(inner, &pubrel)?;
        }
        Packet::Pubcomp { packet_id } => {
            debug!(packet_id, "received pubcomp");
            let mut state = inner.state.lock().unwrap();
            if state.store.clear(packet_id) {
                state.ids.release(packet_id);
            }
        }
        Packet::Pubrel { packet_id } => {
            debug!(packet_id, "received pubrel");
            send_on_current_link(inner, &encode_packet_id_only(AckKind::Pubcomp, packet_id))?;
        }
        Packet::Suback(suback) => {
            debug!(packet_id = suback.packet_id, "received suback");
            if suback.any_rejected() {
                warn!(packet_id = suback.packet_id, "broker rejected a filter");
            }
            inner.state.lock().unwrap().ids.release(suback.packet_id);
        }
        Packet::Unsuback { packet_id } => {
            debug!(packet_id, "received unsuback");
            inner.state.lock().unwrap().ids.release(packet_id);
        }
        Packet::Pingresp => {
            debug!("received pingresp");
            inner.ping_pending.store(false, Ordering::Release);
        }
        Packet::Connack(_) => {
            warn!("unexpected connack");
        }
    }
    Ok(())
}

/// Resend everything still in the unacked store on a fresh session, DUP
/// set on publishes.
fn retransmit_unacked(inner: &SessionInner, link: &TlsLink) {
    let packets: Vec<Vec<u8>> = {
        let state = inner.state.lock().unwrap();
        state
            .store
            .iter()
            .map(|(_, bytes)| {
                let mut copy = bytes.to_vec();
                set_dup_flag(&mut copy);
                copy
            })
            .collect()
    };

    for bytes in packets {
        let _guard = inner.send_mtx.lock().unwrap();
        if let Err(e) = link.write_all(&bytes) {
            error!(error = %e, "retransmission failed");
            break;
        }
    }
}

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
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use arrayvec::ArrayVec;
use tracing::{debug, error, info, trace, warn};
use zbus::blocking::fdo::DBusProxy;
use zbus::blocking::{Connection, MessageIterator};
use zbus::zvariant::OwnedObjectPath;
use zbus::{MatchRule, OwnedMatchRule};

use crate::bus::{Handle, Notifier};
use crate::error::{Error, Result};
use crate::health::component::unit_name;
use crate::health::dbus::{self, SystemdBus};
use crate::health::lifecycle::COMPONENT_NAME_MAX_LEN;
use crate::obj::{Kv, Obj};

/// Maximum number of concurrent lifecycle subscriptions.
pub const MAX_HEALTH_SUBSCRIPTIONS: usize = 10;

#[derive(Default)]
struct SubSlot {
    // Slot is free iff handle == 0.
    component: ArrayVec<u8, COMPONENT_NAME_MAX_LEN>,
    handle: Handle,
    unit_path: Option<OwnedObjectPath>,
    rule: Option<OwnedMatchRule>,
}

/// Lifecycle-completion subscription table and its D-Bus plumbing.
///
/// All match-rule mutation runs on the ops thread; requester threads hand
/// over a slot index through a bounded rendezvous and block for the
/// result (`Expected` marks "no result yet" in the slot). Signals are
/// drained by a separate pump thread and fanned out to the matching
/// slot's bus handle when the observed state is terminal.
pub struct HealthEvents {
    inner: Arc<EventsInner>,
}

struct EventsInner {
    bus: SystemdBus,
    slots: Mutex<Vec<SubSlot>>,
    // One in-flight operation at a time.
    op_gate: Mutex<()>,
    ops_tx: SyncSender<usize>,
    op_result: Mutex<Result<()>>,
    op_cond: Condvar,
    notifier: OnceLock<Notifier>,
}

impl HealthEvents {
    pub fn new() -> Self {
        let (ops_tx, ops_rx) = sync_channel(0);
        let inner = Arc::new(EventsInner {
            bus: SystemdBus::new(),
            slots: Mutex::new(
                (0..MAX_HEALTH_SUBSCRIPTIONS)
                    .map(|_| SubSlot::default())
                    .collect(),
            ),
            op_gate: Mutex::new(()),
            ops_tx,
            op_result: Mutex::new(Err(Error::Expected)),
            op_cond: Condvar::new(),
            notifier: OnceLock::new(),
        });

        let setup = inner.clone();
        if let Err(e) = thread::Builder::new()
            .name("health-events".into())
            .spawn(move || event_loop(setup, ops_rx))
        {
            error!(error = %e, "failed to spawn event loop thread");
        }

        HealthEvents { inner }
    }

    pub fn bus(&self) -> &SystemdBus {
        &self.inner.bus
    }

    /// Where terminal-state notifications are pushed.
    pub fn set_notifier(&self, notifier: Notifier) {
        let _ = self.inner.notifier.set(notifier);
    }

    /// Register a watch on `component`, bound to a subscription handle.
    pub fn register(&self, component: &[u8], handle: Handle) -> Result<()> {
        trace!(
            component = %String::from_utf8_lossy(component),
            handle,
            "registering lifecycle watch"
        );
        if component.is_empty() || component.len() > COMPONENT_NAME_MAX_LEN {
            return Err(Error::Range);
        }

        let index = {
            let mut slots = self.inner.slots.lock().unwrap();
            let index = match slots.iter().position(|s| s.handle == 0) {
                Some(index) => index,
                None => {
                    error!("unable to find open subscription slot");
                    return Err(Error::NoMem);
                }
            };
            let slot = &mut slots[index];
            slot.component.clear();
            slot.component
                .try_extend_from_slice(component)
                .expect("length checked above");
            slot.handle = handle;
            index
        };

        let ret = self.inner.signal_event_loop_and_wait(index);
        if ret.is_err() {
            let mut slots = self.inner.slots.lock().unwrap();
            slots[index] = SubSlot::default();
        }
        ret
    }

    /// Tear down every watch bound to `handle`. Invoked by the bus
    /// transport's close callback.
    pub fn unregister(&self, handle: Handle) {
        trace!(handle, "unregistering lifecycle watch");
        loop {
            let index = {
                let slots = self.inner.slots.lock().unwrap();
                slots.iter().position(|s| s.handle == handle)
            };
            let Some(index) = index else { break };
            if let Err(e) = self.inner.signal_event_loop_and_wait(index) {
                warn!(handle, error = %e, "failed to remove signal match");
                let mut slots = self.inner.slots.lock().unwrap();
                slots[index] = SubSlot::default();
            }
        }
    }
}

impl Default for HealthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl EventsInner {
    /// Hand one slot index to the event-loop side and block for its
    /// result. The result slot holds `Expected` while no result has been
    /// posted.
    fn signal_event_loop_and_wait(&self, index: usize) -> Result<()> {
        let _gate = self.op_gate.lock().unwrap();
        self.ops_tx.send(index).map_err(|_| Error::Failure)?;
        debug!(index, "waiting for event loop thread to handle request");

        let mut result = self.op_result.lock().unwrap();
        loop {
            match std::mem::replace(&mut *result, Err(Error::Expected)) {
                Err(Error::Expected) => {
                    result = self.op_cond.wait(result).unwrap();
                }
                other => return other,
            }
        }
    }

    fn post_result(&self, ret: Result<()>) {
        let mut result = self.op_result.lock().unwrap();
        *result = ret;
        self.op_cond.notify_one();
    }
}

/// Owns the D-Bus connection: opens it (retrying), enables manager
/// signals, then splits into the ops loop (this thread's receiver) and
/// the signal pump.
fn event_loop(inner: Arc<EventsInner>, ops_rx: Receiver<usize>) {
    let conn = loop {
        match inner.bus.open() {
            Ok(conn) => break conn,
            Err(e) => {
                error!(error = %e, "failed to open bus");
                thread::sleep(Duration::from_secs(1));
            }
        }
    };

    while let Err(e) = dbus::manager_subscribe(&conn) {
        error!(error = %e, "failed to enable bus signals");
        thread::sleep(Duration::from_secs(1));
    }

    let pump_inner = inner.clone();
    let pump_conn = conn.clone();
    if let Err(e) = thread::Builder::new()
        .name("health-signals".into())
        .spawn(move || signal_pump(pump_inner, pump_conn))
    {
        error!(error = %e, "failed to spawn signal pump");
    }

    info!("health event loop started");
    while let Ok(index) = ops_rx.recv() {
        let ret = handle_op(&inner, &conn, index);
        inner.post_result(ret);
    }
    error!("bailed out of event loop");
}

/// Register or unregister the match for one slot, decided by whether the
/// slot already holds a rule.
fn handle_op(inner: &EventsInner, conn: &Connection, index: usize) -> Result<()> {
    let registered = {
        let slots = inner.slots.lock().unwrap();
        slots[index].rule.is_some()
    };
    if registered {
        unregister_signal(inner, conn, index)
    } else {
        register_signal(inner, conn, index)
    }
}

fn register_signal(inner: &EventsInner, conn: &Connection, index: usize) -> Result<()> {
    debug!(index, "event loop thread enabling signal");
    let component = {
        let slots = inner.slots.lock().unwrap();
        slots[index].component.clone()
    };

    let unit = unit_name(&component)?;
    let unit_path = dbus::load_unit(conn, &unit)?;

    let rule: MatchRule<'static> = MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface("org.freedesktop.DBus.Properties")
        .map_err(|_| Error::Fatal)?
        .member("PropertiesChanged")
        .map_err(|_| Error::Fatal)?
        .path(unit_path.clone())
        .map_err(|_| Error::Fatal)?
        .build();

    DBusProxy::new(conn)
        .map_err(|e| dbus::translate_dbus_error(&e))?
        .add_match_rule(rule.clone())
        .map_err(|e| {
            error!(unit, "failed to match signal");
            dbus::translate_dbus_error(&e.into())
        })?;

    let mut slots = inner.slots.lock().unwrap();
    slots[index].unit_path = Some(unit_path);
    slots[index].rule = Some(rule.into());
    Ok(())
}

fn unregister_signal(inner: &EventsInner, conn: &Connection, index: usize) -> Result<()> {
    debug!(index, "event loop thread disabling signal");
    let rule = {
        let mut slots = inner.slots.lock().unwrap();
        let slot = &mut slots[index];
        let rule = slot.rule.take();
        *slot = SubSlot::default();
        rule
    };

    if let Some(rule) = rule {
        let rule: MatchRule<'static> = rule.into();
        DBusProxy::new(conn)
            .map_err(|e| dbus::translate_dbus_error(&e))?
            .remove_match_rule(rule)
            .map_err(|e| dbus::translate_dbus_error(&e.into()))?;
    }
    Ok(())
}

/// Drain `PropertiesChanged` signals and notify subscribers whose unit
/// reached a terminal state.
fn signal_pump(inner: Arc<EventsInner>, conn: Connection) {
    let iter = MessageIterator::from(conn.clone());
    for message in iter {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "signal stream error");
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        };

        let header = message.header();
        if header.message_type() != zbus::message::Type::Signal {
            continue;
        }
        if header.member().map(|m| m.as_str()) != Some("PropertiesChanged") {
            continue;
        }
        let Some(path) = header.path() else {
            debug!("signal has no path, skipping");
            continue;
        };
        debug!(path = %path, "properties changed");

        let matched = {
            let slots = inner.slots.lock().unwrap();
            slots
                .iter()
                .find(|s| {
                    s.handle != 0
                        && s.unit_path
                            .as_ref()
                            .is_some_and(|p| p.as_str() == path.as_str())
                })
                .map(|s| (s.component.clone(), s.handle, s.unit_path.clone()))
        };
        let Some((component, handle, Some(unit_path))) = matched else {
            continue;
        };

        let state = match dbus::lifecycle_state(&conn, &unit_path) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "failed to read lifecycle state for signal");
                continue;
            }
        };

        if !state.is_terminal() {
            debug!(state = %state, "signalled for non-terminal state");
            continue;
        }

        info!(
            component = %String::from_utf8_lossy(&component),
            state = %state,
            "component finished its lifecycle"
        );
        if let Some(notifier) = inner.notifier.get() {
            let pairs = [
                Kv::new(b"component_name", Obj::Buf(&component)),
                Kv::new(b"lifecycle_state", Obj::Buf(state.as_str().as_bytes())),
            ];
            let _ = notifier.sub_respond(handle, Obj::Map(&pairs));
        }
    }
}

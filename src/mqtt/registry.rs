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
use std::sync::Mutex;

use arrayvec::ArrayVec;
use tracing::{debug, error};

use crate::bus::Handle;
use crate::error::{Error, Result};
use crate::mqtt::packet::Qos;
use crate::mqtt::topic::topic_filter_match;

/// Maximum size of an MQTT topic that can be subscribed to.
///
/// Basic ingest topics can be longer but can't be subscribed to, so this
/// bounds the filters we may receive publishes on.
pub const MAX_TOPIC_FILTER_LEN: usize = 256;

/// Maximum number of concurrent MQTT subscriptions.
pub const MAX_SUBSCRIPTIONS: usize = 128;

#[derive(Clone)]
struct Slot {
    // Slot is free iff the filter is empty.
    filter: ArrayVec<u8, MAX_TOPIC_FILTER_LEN>,
    handle: Handle,
    qos: Qos,
}

impl Slot {
    const fn free() -> Slot {
        Slot {
            filter: ArrayVec::new_const(),
            handle: 0,
            qos: Qos::AtMostOnce,
        }
    }
}

/// Fixed-capacity table binding topic filters to core-bus handles.
///
/// A single slot may be referenced by several inbound publishes
/// concurrently; registration, fan-out and mutation all take the registry
/// mutex. Lock order is registry mutex before any transport send lock, so
/// sending while holding the registry lock (replay, fan-out delivery) is
/// fine, and nothing here may call back into the bus beyond the delivery
/// callback it was given.
pub struct SubscriptionRegistry {
    slots: Mutex<Vec<Slot>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry {
            slots: Mutex::new(vec![Slot::free(); MAX_SUBSCRIPTIONS]),
        }
    }

    /// Claim one slot per filter for `handle`.
    ///
    /// The whole batch is validated first: an empty filter fails
    /// `Invalid`, an oversized one `Range`, and nothing is claimed. If
    /// space runs out mid-batch, every slot already claimed for `handle`
    /// is freed again and the call fails `NoMem`.
    pub fn register(&self, filters: &[&[u8]], handle: Handle, qos: Qos) -> Result<()> {
        for filter in filters {
            if filter.is_empty() {
                error!("attempted to register a 0 length topic filter");
                return Err(Error::Invalid);
            }
        }
        for filter in filters {
            if filter.len() > MAX_TOPIC_FILTER_LEN {
                error!("topic filter exceeds max length");
                return Err(Error::Range);
            }
        }

        let mut slots = self.slots.lock().unwrap();

        let mut filter_index = 0;
        for slot in slots.iter_mut() {
            if slot.filter.is_empty() {
                slot.filter.clear();
                slot.filter
                    .try_extend_from_slice(filters[filter_index])
                    .expect("length validated above");
                slot.handle = handle;
                slot.qos = qos;
                filter_index += 1;
                if filter_index == filters.len() {
                    return Ok(());
                }
            }
        }
        error!("configured maximum subscriptions exceeded");

        for slot in slots.iter_mut() {
            if slot.handle == handle {
                slot.filter.clear();
            }
        }

        Err(Error::NoMem)
    }

    /// Free every slot held by `handle`, returning the freed filters so
    /// the caller can unsubscribe them from the broker (skipped when the
    /// connection is already down or a partial registration is being
    /// rolled back).
    pub fn unregister(&self, handle: Handle) -> Vec<Vec<u8>> {
        let mut slots = self.slots.lock().unwrap();
        let mut freed = Vec::new();
        for slot in slots.iter_mut() {
            if slot.handle == handle && !slot.filter.is_empty() {
                freed.push(slot.filter.to_vec());
                slot.filter.clear();
            }
        }
        freed
    }

    /// Re-subscribe every active slot after a fresh broker session.
    ///
    /// Failures are logged and the slot stays in place so a later
    /// reconnect retries it.
    pub fn replay(&self, mut send: impl FnMut(&[u8], Qos) -> Result<()>) {
        let slots = self.slots.lock().unwrap();
        for slot in slots.iter() {
            if slot.filter.is_empty() {
                continue;
            }
            if let Err(e) = send(&slot.filter, slot.qos) {
                error!(
                    filter = %String::from_utf8_lossy(&slot.filter),
                    error = %e,
                    "failed to replay subscription"
                );
            }
        }
    }

    /// Fan an inbound publish out to every slot whose filter matches.
    ///
    /// Slots are never reordered; delivery order is the registry order.
    pub fn receive(&self, topic: &[u8], mut deliver: impl FnMut(Handle)) {
        let slots = self.slots.lock().unwrap();
        for slot in slots.iter() {
            if !slot.filter.is_empty() && topic_filter_match(&slot.filter, topic) {
                debug!(
                    handle = slot.handle,
                    topic = %String::from_utf8_lossy(topic),
                    "delivering publish"
                );
                deliver(slot.handle);
            }
        }
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        let slots = self.slots.lock().unwrap();
        slots.iter().filter(|s| !s.filter.is_empty()).count()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

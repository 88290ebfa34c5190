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

use tracing::error;

use crate::bus::{Handle, Notifier};
use crate::error::{Error, Result};
use crate::obj::Obj;

/// Maximum number of connection-status subscribers.
pub const MAX_STATUS_SUBSCRIPTIONS: usize = 10;

/// Bounded registry of connection-status subscription handles.
///
/// Every connection transition is pushed to each registered handle as a
/// bool. A status read followed by a push can reorder against a
/// concurrent transition; that window is inherent to read-then-send and
/// accepted.
pub struct StatusRegistry {
    handles: Mutex<[Handle; MAX_STATUS_SUBSCRIPTIONS]>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        StatusRegistry {
            handles: Mutex::new([0; MAX_STATUS_SUBSCRIPTIONS]),
        }
    }

    pub fn register(&self, handle: Handle) -> Result<()> {
        let mut handles = self.handles.lock().unwrap();
        for slot in handles.iter_mut() {
            if *slot == 0 {
                *slot = handle;
                return Ok(());
            }
        }
        error!("no open connection status subscription slot");
        Err(Error::NoMem)
    }

    pub fn unregister(&self, handle: Handle) {
        let mut handles = self.handles.lock().unwrap();
        for slot in handles.iter_mut() {
            if *slot == handle {
                *slot = 0;
            }
        }
    }

    /// Push `connected` to every registered subscriber.
    pub fn send(&self, connected: bool, notifier: &Notifier) {
        // Snapshot so a push failure (which tears its connection down and
        // re-enters unregister) cannot deadlock on the slot lock.
        let snapshot = *self.handles.lock().unwrap();
        for handle in snapshot {
            if handle != 0 {
                let _ = notifier.sub_respond(handle, Obj::Bool(connected));
            }
        }
    }

    /// Push the current status to a single, newly accepted subscriber.
    pub fn send_current(&self, handle: Handle, connected: bool, notifier: &Notifier) {
        let _ = notifier.sub_respond(handle, Obj::Bool(connected));
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

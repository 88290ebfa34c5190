// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Core-bus: local request/response and subscription RPC over
//! filesystem-named endpoints.
//!
//! An endpoint is an opaque short name (e.g. `aws_iot_mqtt`, `gg_health`)
//! mapped to a unix socket under the bus directory. Servers bind and serve
//! a fixed table of `(method, handler)` pairs; clients connect and issue
//! calls or open subscriptions. Error kinds travel verbatim in the reply
//! frame.

mod frame;
pub use frame::{MAX_FRAME_LEN, MAX_METHOD_LEN};

mod server;
pub use server::{Caller, Handle, Method, Notifier, Server};

mod client;
pub use client::{subscribe, Conn, Subscription};

use std::env;
use std::path::PathBuf;

/// Resolve an endpoint name to its rendezvous path.
///
/// Sockets live under `$EDGE_BUS_DIR` (default `/run/edge-runtime`); the
/// opaque endpoint name becomes the file name with any `/` flattened to
/// `.` so hierarchical names stay single path components.
pub fn endpoint_path(endpoint: &str) -> PathBuf {
    let dir = env::var_os("EDGE_BUS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/run/edge-runtime"));
    let name: String = endpoint
        .trim_start_matches('/')
        .chars()
        .map(|c| if c == '/' { '.' } else { c })
        .collect();
    dir.join(name)
}

//! # Edge Runtime Core
//!
//! Shared runtime substrate for a constrained-device edge agent composed of
//! several cooperating daemons (MQTT bridge, health/lifecycle supervisor,
//! configuration store clients, deployment workers).
//!
//! The crate provides four layers, leaves first:
//!
//! - [`obj`] - a tagged-union dynamic value over borrowed storage, a
//!   single-shot bump arena, bounded vector builders, and declarative map
//!   schema validation. Every daemon encodes requests, responses and
//!   configuration through this layer.
//! - [`bus`] - the core-bus: a local, connection-oriented request/response
//!   and subscription RPC transport over filesystem-named endpoints.
//! - [`mqtt`] - a persistent TLS MQTT 3.1.1 client with keep-alive pinger,
//!   receive loop, unacknowledged-publish store, topic-filter matching, and
//!   a bounded subscription registry that fans inbound publishes out to
//!   core-bus subscribers.
//! - [`health`] - systemd-unit health: lifecycle-state queries, state
//!   update notification, and `PropertiesChanged` multiplexing into
//!   core-bus subscriptions.
//!
//! ## Error model
//!
//! All fallible operations return [`error::Error`], a single flat kind set
//! propagated verbatim across the core-bus. There is no separate exception
//! path; panics are reserved for invariant violations caught by debug
//! assertions.
//!
//! ## Concurrency
//!
//! Preemptive OS threads only. Core-bus handlers run on transport-owned
//! worker threads and must assume they can be called concurrently with any
//! other handler on the same endpoint. Arenas are single-owner and not
//! thread safe. The documented lock order is: subscription-registry mutex
//! before any transport send lock, never the reverse.

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

pub mod bus;
pub mod config;
pub mod error;
pub mod health;
pub mod logger;
pub mod mqtt;
pub mod obj;

pub use error::{Error, Result};

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

//! MQTT 3.1.1 client core: a single persistent TLS broker session with
//! keep-alive, reconnect backoff, an unacked-publish store, and a bounded
//! subscription registry with topic-filter fan-out.

pub mod packet;

mod registry;
pub use registry::{SubscriptionRegistry, MAX_SUBSCRIPTIONS, MAX_TOPIC_FILTER_LEN};

mod session;
pub use session::{
    ConnectFn, MessageFn, Session, SessionConfig, SessionConfigBuilder, StatusFn,
    CONNACK_TIMEOUT, DEFAULT_KEEP_ALIVE_SECS, MAX_SUBSCRIBE_FILTERS,
};

mod status;
pub use status::{StatusRegistry, MAX_STATUS_SUBSCRIPTIONS};

mod store;
pub use store::{UnackedStore, MAX_UNACKED_RECORDS, UNACKED_STORE_BUFFER_LEN};

mod topic;
pub use topic::topic_filter_match;

mod transport;
pub use transport::{TlsLink, BROKER_PORT};

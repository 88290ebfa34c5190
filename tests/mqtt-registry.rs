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

mod common;

use edge_runtime_core::error::Error;
use edge_runtime_core::mqtt::packet::Qos;
use edge_runtime_core::mqtt::{SubscriptionRegistry, MAX_SUBSCRIPTIONS, MAX_TOPIC_FILTER_LEN};

#[test]
fn register_then_unregister_frees_all_slots() {
    common::init_tracing();
    let registry = SubscriptionRegistry::new();

    registry
        .register(&[b"a/b", b"c/+", b"d/#"], 7, Qos::AtLeastOnce)
        .unwrap();
    assert_eq!(registry.active_count(), 3);

    let freed = registry.unregister(7);
    assert_eq!(registry.active_count(), 0);
    let mut freed_sorted = freed;
    freed_sorted.sort();
    assert_eq!(freed_sorted, vec![b"a/b".to_vec(), b"c/+".to_vec(), b"d/#".to_vec()]);
}

#[test]
fn invalid_filters_reject_whole_batch() {
    common::init_tracing();
    let registry = SubscriptionRegistry::new();

    assert_eq!(
        registry.register(&[b"a/b", b""], 1, Qos::AtMostOnce),
        Err(Error::Invalid)
    );
    let long = vec![b'x'; MAX_TOPIC_FILTER_LEN + 1];
    assert_eq!(
        registry.register(&[b"a/b", &long], 1, Qos::AtMostOnce),
        Err(Error::Range)
    );
    assert_eq!(registry.active_count(), 0);
}

#[test]
fn exhaustion_mid_batch_rolls_back() {
    common::init_tracing();
    let registry = SubscriptionRegistry::new();

    // Leave exactly one free slot.
    let filler: Vec<Vec<u8>> = (0..MAX_SUBSCRIPTIONS - 1)
        .map(|i| format!("fill/{i}").into_bytes())
        .collect();
    for filter in &filler {
        registry.register(&[filter], 1, Qos::AtMostOnce).unwrap();
    }
    assert_eq!(registry.active_count(), MAX_SUBSCRIPTIONS - 1);

    // A two-filter batch claims the last slot, then runs out.
    assert_eq!(
        registry.register(&[b"x/1", b"x/2"], 42, Qos::AtMostOnce),
        Err(Error::NoMem)
    );
    // No slot may still reference the failed handle.
    assert!(registry.unregister(42).is_empty());
    assert_eq!(registry.active_count(), MAX_SUBSCRIPTIONS - 1);
}

#[test]
fn fan_out_delivers_once_per_matching_slot_in_order() {
    common::init_tracing();
    let registry = SubscriptionRegistry::new();

    registry.register(&[b"a/+/c"], 1, Qos::AtMostOnce).unwrap();
    registry.register(&[b"x/y"], 2, Qos::AtMostOnce).unwrap();
    registry.register(&[b"a/#"], 3, Qos::AtMostOnce).unwrap();
    registry.register(&[b"a/+/c"], 4, Qos::AtMostOnce).unwrap();

    let mut delivered = Vec::new();
    registry.receive(b"a/b/c", |handle| delivered.push(handle));
    assert_eq!(delivered, vec![1, 3, 4]);

    let mut delivered = Vec::new();
    registry.receive(b"no/match", |handle| delivered.push(handle));
    assert!(delivered.is_empty());
}

#[test]
fn replay_covers_every_active_slot() {
    common::init_tracing();
    let registry = SubscriptionRegistry::new();

    registry.register(&[b"a/b"], 1, Qos::AtMostOnce).unwrap();
    registry
        .register(&[b"c/d", b"e/f"], 2, Qos::AtLeastOnce)
        .unwrap();
    registry.unregister(1);

    let mut replayed = Vec::new();
    registry.replay(|filter, qos| {
        replayed.push((filter.to_vec(), qos));
        Ok(())
    });
    assert_eq!(
        replayed,
        vec![
            (b"c/d".to_vec(), Qos::AtLeastOnce),
            (b"e/f".to_vec(), Qos::AtLeastOnce),
        ]
    );

    // A failing send keeps the slot for the next reconnect.
    let mut calls = 0;
    registry.replay(|_, _| {
        calls += 1;
        Err(Error::NoConn)
    });
    assert_eq!(calls, 2);
    assert_eq!(registry.active_count(), 2);
}

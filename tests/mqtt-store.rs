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
use edge_runtime_core::mqtt::{UnackedStore, MAX_UNACKED_RECORDS, UNACKED_STORE_BUFFER_LEN};

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

/// Every live record's bytes start where the previous record's end, and
/// iteration yields still-live ids in insertion order.
fn assert_contiguous(store: &UnackedStore, expected_ids: &[u16]) {
    let mut offset = 0;
    let mut ids = Vec::new();
    for (id, bytes) in store.iter() {
        assert_eq!(store.offset_of(id), Some(offset));
        offset += bytes.len();
        ids.push(id);
    }
    assert_eq!(offset, store.bytes_used());
    assert_eq!(ids, expected_ids);
}

#[test]
fn clear_middle_compacts_forward() {
    common::init_tracing();
    let mut store = UnackedStore::new();

    store.store(1, &pattern(100, 0)).unwrap();
    store.store(2, &pattern(50, 100)).unwrap();
    store.store(3, &pattern(75, 200)).unwrap();
    assert_eq!(store.bytes_used(), 225);

    assert!(store.clear(2));

    assert_eq!(store.offset_of(1), Some(0));
    assert_eq!(store.offset_of(3), Some(100));
    assert_eq!(store.bytes_used(), 175);
    assert_eq!(store.record_count(), 2);
    assert_eq!(store.retrieve(1).unwrap(), pattern(100, 0));
    assert_eq!(store.retrieve(3).unwrap(), pattern(75, 200));
    assert_contiguous(&store, &[1, 3]);
}

#[test]
fn interleaved_store_and_clear_keeps_invariants() {
    common::init_tracing();
    let mut store = UnackedStore::new();

    store.store(10, &pattern(40, 1)).unwrap();
    store.store(11, &pattern(10, 2)).unwrap();
    assert!(store.clear(10));
    store.store(12, &pattern(25, 3)).unwrap();
    store.store(13, &pattern(5, 4)).unwrap();
    assert!(store.clear(12));
    assert!(!store.clear(12));

    assert_contiguous(&store, &[11, 13]);
    assert_eq!(store.retrieve(11).unwrap(), pattern(10, 2));
    assert_eq!(store.retrieve(13).unwrap(), pattern(5, 4));
    assert!(store.retrieve(12).is_none());
}

#[test]
fn record_table_exhaustion_leaves_store_unchanged() {
    common::init_tracing();
    let mut store = UnackedStore::new();

    for id in 1..=MAX_UNACKED_RECORDS as u16 {
        store.store(id, &pattern(8, id as u8)).unwrap();
    }
    let used = store.bytes_used();

    assert_eq!(store.store(99, &pattern(8, 99)), Err(Error::NoMem));
    assert_eq!(store.bytes_used(), used);
    assert_eq!(store.record_count(), MAX_UNACKED_RECORDS);
    assert!(!store.contains(99));
}

#[test]
fn byte_exhaustion_leaves_store_unchanged() {
    common::init_tracing();
    let mut store = UnackedStore::new();

    store
        .store(1, &pattern(UNACKED_STORE_BUFFER_LEN - 10, 1))
        .unwrap();
    assert_eq!(store.store(2, &pattern(11, 2)), Err(Error::NoMem));
    assert_eq!(store.record_count(), 1);
    assert_eq!(store.bytes_used(), UNACKED_STORE_BUFFER_LEN - 10);

    // An exact fit still works.
    store.store(3, &pattern(10, 3)).unwrap();
    assert_contiguous(&store, &[1, 3]);
}

#[test]
fn duplicate_ids_rejected() {
    common::init_tracing();
    let mut store = UnackedStore::new();
    store.store(5, &pattern(4, 0)).unwrap();
    assert_eq!(store.store(5, &pattern(4, 1)), Err(Error::Invalid));
    assert_eq!(store.retrieve(5).unwrap(), pattern(4, 0));
}

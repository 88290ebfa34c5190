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
use edge_runtime_core::obj::Arena;

#[test]
fn alloc_respects_alignment_and_bounds() {
    common::init_tracing();
    let mut mem = vec![0u8; 256];
    let arena = Arena::new(&mut mem);

    for align in [1usize, 2, 4, 8, 16] {
        let alloc = arena.alloc(5, align).expect("fits");
        assert_eq!(alloc.as_ptr() as usize % align, 0);
        assert_eq!(alloc.len(), 5);
    }
    assert!(arena.index() <= arena.capacity());
}

#[test]
fn overflow_leaves_index_unchanged() {
    common::init_tracing();
    let mut mem = vec![0u8; 64];
    let arena = Arena::new(&mut mem);

    for _ in 0..4 {
        assert!(arena.alloc(16, 1).is_some());
    }
    assert!(arena.alloc(16, 1).is_none());
    assert_eq!(arena.index(), 64);
    assert_eq!(arena.remaining(), 0);
}

#[test]
fn resize_last_preserves_bytes() {
    common::init_tracing();
    let mut mem = vec![0u8; 64];
    let arena = Arena::new(&mut mem);

    let first = arena.alloc(8, 1).unwrap();
    first.copy_from_slice(b"abcdefgh");
    let grown = arena.resize_last(first, 16).expect("room to grow");
    assert_eq!(&grown[..8], b"abcdefgh");
    assert_eq!(arena.index(), 16);

    let shrunk = arena.resize_last(grown, 4).expect("shrink always fits");
    assert_eq!(&shrunk[..], b"abcd");
    assert_eq!(arena.index(), 4);
}

#[test]
fn resize_not_last_is_invalid() {
    common::init_tracing();
    let mut mem = vec![0u8; 64];
    let arena = Arena::new(&mut mem);

    let first = arena.alloc(8, 1).unwrap();
    let _second = arena.alloc(8, 1).unwrap();
    assert_eq!(arena.resize_last(first, 16).unwrap_err(), Error::Invalid);
}

#[test]
fn resize_beyond_capacity_is_nomem() {
    common::init_tracing();
    let mut mem = vec![0u8; 32];
    let arena = Arena::new(&mut mem);

    let alloc = arena.alloc(16, 1).unwrap();
    assert_eq!(arena.resize_last(alloc, 64).unwrap_err(), Error::NoMem);
    assert_eq!(arena.index(), 16);
}

#[test]
fn owns_covers_backing_buffer_only() {
    common::init_tracing();
    let mut mem = vec![0u8; 32];
    let other = [0u8; 4];
    let arena = Arena::new(&mut mem);

    let alloc = arena.alloc(4, 1).unwrap();
    assert!(arena.owns(alloc.as_ptr()));
    assert!(!arena.owns(other.as_ptr()));
}

#[test]
fn typed_allocations() {
    common::init_tracing();
    let mut mem = vec![0u8; 256];
    let arena = Arena::new(&mut mem);

    let copied = arena.alloc_copy_slice(&[1u32, 2, 3]).unwrap();
    assert_eq!(&copied[..], [1, 2, 3]);
    assert_eq!(copied.as_ptr() as usize % core::mem::align_of::<u32>(), 0);

    let filled = arena.alloc_slice_fill(4, 7u16).unwrap();
    assert_eq!(&filled[..], [7, 7, 7, 7]);
}

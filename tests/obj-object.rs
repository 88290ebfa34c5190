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
use edge_runtime_core::obj::{deep_copy, map_get, str_to_int64, substr, Arena, Kv, Obj};
use static_assertions::const_assert;

// Obj is passed by value everywhere; keep it register-friendly.
const_assert!(core::mem::size_of::<Obj<'static>>() <= 24);

#[test]
fn map_get_returns_first_match() {
    common::init_tracing();
    let map = [
        Kv::new(b"key", Obj::I64(1)),
        Kv::new(b"other", Obj::I64(2)),
        Kv::new(b"key", Obj::I64(3)),
    ];
    assert_eq!(map_get(&map, b"key"), Some(Obj::I64(1)));
    assert_eq!(map_get(&map, b"other"), Some(Obj::I64(2)));
    assert_eq!(map_get(&map, b"missing"), None);
}

#[test]
fn deep_copy_moves_storage_into_arena() {
    common::init_tracing();
    let payload = vec![0x01u8, 0x02];
    let inner = [Obj::Buf(&payload), Obj::I64(-5)];
    let map = [
        Kv::new(b"topic", Obj::Buf(b"a/b/c")),
        Kv::new(b"extras", Obj::List(&inner)),
    ];
    let original = Obj::Map(&map);

    let mut mem = vec![0u8; 1024];
    let arena = Arena::new(&mut mem);
    let copied = deep_copy(original, &arena).expect("fits");

    assert_eq!(copied, original);
    let pairs = copied.as_map().unwrap();
    assert!(arena.owns(pairs.as_ptr().cast()));
    assert!(arena.owns(pairs[0].key.as_ptr()));
    assert!(arena.owns(pairs[0].val.as_buf().unwrap().as_ptr()));
    let extras = pairs[1].val.as_list().unwrap();
    assert!(arena.owns(extras.as_ptr().cast()));
    assert!(arena.owns(extras[0].as_buf().unwrap().as_ptr()));
}

#[test]
fn deep_copy_fails_nomem_on_tiny_arena() {
    common::init_tracing();
    let map = [Kv::new(b"topic", Obj::Buf(b"a/b/c"))];
    let mut mem = vec![0u8; 8];
    let arena = Arena::new(&mut mem);
    assert_eq!(deep_copy(Obj::Map(&map), &arena), Err(Error::NoMem));
}

#[test]
fn scalars_copy_without_allocating() {
    common::init_tracing();
    let mut mem = vec![0u8; 0];
    let arena = Arena::new(&mut mem);
    assert_eq!(deep_copy(Obj::Null, &arena), Ok(Obj::Null));
    assert_eq!(deep_copy(Obj::Bool(true), &arena), Ok(Obj::Bool(true)));
    assert_eq!(deep_copy(Obj::I64(9), &arena), Ok(Obj::I64(9)));
    assert_eq!(deep_copy(Obj::F64(0.5), &arena), Ok(Obj::F64(0.5)));
}

#[test]
fn substr_clamps_both_endpoints() {
    common::init_tracing();
    let buf = b"hello";
    assert_eq!(substr(buf, 1, 3), b"el");
    assert_eq!(substr(buf, 0, 100), b"hello");
    assert_eq!(substr(buf, 100, 200), b"");
    assert_eq!(substr(buf, 3, 1), b"");
    assert_eq!(substr(buf, 5, 5), b"");
}

#[test]
fn str_to_int64_cases() {
    common::init_tracing();
    assert_eq!(str_to_int64(b"0"), Ok(0));
    assert_eq!(str_to_int64(b"-0"), Ok(0));
    assert_eq!(str_to_int64(b"42"), Ok(42));
    assert_eq!(str_to_int64(b"-17"), Ok(-17));
    assert_eq!(str_to_int64(b""), Err(Error::Invalid));
    assert_eq!(str_to_int64(b"-"), Err(Error::Invalid));
    assert_eq!(str_to_int64(b"1x"), Err(Error::Invalid));
    assert_eq!(str_to_int64(b" 1"), Err(Error::Invalid));
    assert_eq!(str_to_int64(b"+1"), Err(Error::Invalid));
    assert_eq!(str_to_int64(b"9223372036854775808"), Err(Error::Range));
}

#[test]
fn display_renders_json() {
    common::init_tracing();
    let map = [
        Kv::new(b"name", Obj::Buf(b"core")),
        Kv::new(b"up", Obj::Bool(true)),
    ];
    assert_eq!(
        Obj::Map(&map).to_string(),
        r#"{"name":"core","up":true}"#
    );
}

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
use edge_runtime_core::obj::{BufVec, ByteVec, KvVec, Kv, Obj, ObjVec};

#[test]
fn byte_vec_bounds() {
    common::init_tracing();
    let mut storage = [0u8; 4];
    let mut vec = ByteVec::new(&mut storage);

    vec.append(b"abc").unwrap();
    vec.push(b'd').unwrap();
    assert_eq!(vec.push(b'e'), Err(Error::NoMem));
    assert_eq!(vec.append(b"x"), Err(Error::NoMem));
    assert_eq!(vec.as_slice(), b"abcd");
    assert_eq!(vec.len(), 4);
    assert_eq!(vec.capacity(), 4);
}

#[test]
fn byte_vec_chain_skips_after_first_error() {
    common::init_tracing();
    let mut storage = [0u8; 4];
    let mut vec = ByteVec::new(&mut storage);

    let mut ret = Ok(());
    vec.chain_append(&mut ret, b"ab");
    vec.chain_append(&mut ret, b"cde");
    vec.chain_push(&mut ret, b'f');
    assert_eq!(ret, Err(Error::NoMem));
    // The failed append and everything after it were skipped.
    assert_eq!(vec.as_slice(), b"ab");
}

#[test]
fn obj_vec_push_pop() {
    common::init_tracing();
    let mut storage = [Obj::Null; 2];
    let mut vec = ObjVec::new(&mut storage);

    vec.push(Obj::I64(1)).unwrap();
    vec.push(Obj::Bool(false)).unwrap();
    assert_eq!(vec.push(Obj::Null), Err(Error::NoMem));
    assert_eq!(vec.as_list(), &[Obj::I64(1), Obj::Bool(false)]);
    assert_eq!(vec.pop(), Some(Obj::Bool(false)));
    assert_eq!(vec.pop(), Some(Obj::I64(1)));
    assert_eq!(vec.pop(), None);
}

#[test]
fn kv_vec_builds_map() {
    common::init_tracing();
    let empty = Kv::new(b"", Obj::Null);
    let mut storage = [empty; 2];
    let mut vec = KvVec::new(&mut storage);

    let mut ret = Ok(());
    vec.chain_push(&mut ret, Kv::new(b"a", Obj::I64(1)));
    vec.chain_push(&mut ret, Kv::new(b"b", Obj::I64(2)));
    vec.chain_push(&mut ret, Kv::new(b"c", Obj::I64(3)));
    assert_eq!(ret, Err(Error::NoMem));
    assert_eq!(vec.len(), 2);
    assert_eq!(vec.as_map()[1].key, b"b");
}

#[test]
fn buf_vec_append_list_rejects_non_buffers() {
    common::init_tracing();
    let mut storage: [&[u8]; 4] = [&[]; 4];
    let mut vec = BufVec::new(&mut storage);

    vec.append_list(&[Obj::Buf(b"a"), Obj::Buf(b"b")]).unwrap();
    assert_eq!(vec.as_bufs(), &[b"a".as_slice(), b"b".as_slice()]);

    assert_eq!(vec.append_list(&[Obj::I64(1)]), Err(Error::Invalid));
}

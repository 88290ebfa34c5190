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
use edge_runtime_core::obj::{map_validate, Kv, Obj, ObjType, SchemaEntry};

#[test]
fn binds_required_and_optional() {
    common::init_tracing();
    let map = [
        Kv::new(b"topic", Obj::Buf(b"a/b")),
        Kv::new(b"qos", Obj::I64(1)),
    ];

    let mut topic = None;
    let mut payload = None;
    let mut qos = None;
    map_validate(
        &map,
        &mut [
            SchemaEntry::required(b"topic", Some(ObjType::Buf), &mut topic),
            SchemaEntry::optional(b"payload", Some(ObjType::Buf), &mut payload),
            SchemaEntry::optional(b"qos", Some(ObjType::I64), &mut qos),
        ],
    )
    .unwrap();

    assert_eq!(topic, Some(Obj::Buf(b"a/b")));
    assert_eq!(payload, None);
    assert_eq!(qos, Some(Obj::I64(1)));
}

#[test]
fn missing_required_key_is_noentry() {
    common::init_tracing();
    let map = [Kv::new(b"payload", Obj::Buf(b"data"))];

    let mut topic = None;
    let ret = map_validate(
        &map,
        &mut [SchemaEntry::required(
            b"topic",
            Some(ObjType::Buf),
            &mut topic,
        )],
    );
    assert_eq!(ret, Err(Error::NoEntry));
}

#[test]
fn wrong_type_is_parse() {
    common::init_tracing();
    // publish({topic: 42})
    let map = [Kv::new(b"topic", Obj::I64(42))];

    let mut topic = None;
    let ret = map_validate(
        &map,
        &mut [SchemaEntry::required(
            b"topic",
            Some(ObjType::Buf),
            &mut topic,
        )],
    );
    assert_eq!(ret, Err(Error::Parse));
}

#[test]
fn untyped_entry_accepts_any_value() {
    common::init_tracing();
    let map = [Kv::new(b"value", Obj::F64(1.5))];

    let mut value = None;
    map_validate(
        &map,
        &mut [SchemaEntry::required(b"value", None, &mut value)],
    )
    .unwrap();
    assert_eq!(value, Some(Obj::F64(1.5)));
}

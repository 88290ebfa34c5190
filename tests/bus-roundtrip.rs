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

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use edge_runtime_core::bus::{self, Caller, Conn, Method, Server};
use edge_runtime_core::error::{Error, Result};
use edge_runtime_core::obj::{map_validate, Arena, Kv, Map, Obj, ObjType, SchemaEntry};

struct TestCtx {
    close_count: Arc<AtomicU32>,
}

static METHODS: &[Method<TestCtx>] = &[
    Method {
        name: b"echo",
        is_sub: false,
        handler: rpc_echo,
    },
    Method {
        name: b"fail",
        is_sub: false,
        handler: rpc_fail,
    },
    Method {
        name: b"ticks",
        is_sub: true,
        handler: rpc_ticks,
    },
];

fn rpc_echo(_ctx: &TestCtx, params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    let mut value = None;
    map_validate(
        params,
        &mut [SchemaEntry::required(
            b"value",
            Some(ObjType::I64),
            &mut value,
        )],
    )?;
    caller.respond(value.unwrap())
}

fn rpc_fail(_ctx: &TestCtx, _params: Map<'_>, _caller: &Caller<'_>) -> Result<()> {
    Err(Error::Range)
}

fn rpc_ticks(ctx: &TestCtx, _params: Map<'_>, caller: &Caller<'_>) -> Result<()> {
    let close_count = ctx.close_count.clone();
    caller.sub_accept(move |_| {
        close_count.fetch_add(1, Ordering::SeqCst);
    })?;
    for tick in 1..=3i64 {
        caller.sub_respond(Obj::I64(tick))?;
    }
    Ok(())
}

/// Bind a fresh endpoint and serve it on a background thread.
fn start_server(endpoint: &str) -> Arc<AtomicU32> {
    common::init_tracing();
    common::init_bus_dir();

    let close_count = Arc::new(AtomicU32::new(0));
    let ctx = Arc::new(TestCtx {
        close_count: close_count.clone(),
    });
    let server = Server::new(endpoint, METHODS, ctx).expect("bind endpoint");
    thread::spawn(move || {
        let _ = server.listen();
    });
    close_count
}

fn wait_for(predicate: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !predicate() {
        assert!(Instant::now() < deadline, "timed out");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn call_roundtrip() {
    let _ = start_server("test_echo");

    let mut conn = Conn::connect("test_echo").unwrap();
    let mut mem = vec![0u8; 1024];
    let arena = Arena::new(&mut mem);
    let params = [Kv::new(b"value", Obj::I64(42))];
    let reply = conn.call(b"echo", Obj::Map(&params), &arena).unwrap();
    assert_eq!(reply, Obj::I64(42));
}

#[test]
fn sequential_calls_reuse_the_connection() {
    let _ = start_server("test_echo_seq");

    let mut conn = Conn::connect("test_echo_seq").unwrap();
    for value in [1i64, -2, 3] {
        let mut mem = vec![0u8; 1024];
        let arena = Arena::new(&mut mem);
        let params = [Kv::new(b"value", Obj::I64(value))];
        let reply = conn.call(b"echo", Obj::Map(&params), &arena).unwrap();
        assert_eq!(reply, Obj::I64(value));
    }
}

#[test]
fn handler_error_reaches_the_caller() {
    let _ = start_server("test_fail");

    let mut conn = Conn::connect("test_fail").unwrap();
    let mut mem = vec![0u8; 256];
    let arena = Arena::new(&mut mem);
    let ret = conn.call(b"fail", Obj::Map(&[]), &arena);
    assert_eq!(ret.unwrap_err(), Error::Range);
}

#[test]
fn schema_violation_propagates_parse() {
    let _ = start_server("test_schema");

    let mut conn = Conn::connect("test_schema").unwrap();
    let mut mem = vec![0u8; 256];
    let arena = Arena::new(&mut mem);
    let params = [Kv::new(b"value", Obj::Buf(b"not a number"))];
    let ret = conn.call(b"echo", Obj::Map(&params), &arena);
    assert_eq!(ret.unwrap_err(), Error::Parse);
}

#[test]
fn unknown_method_is_noentry() {
    let _ = start_server("test_unknown");

    let mut conn = Conn::connect("test_unknown").unwrap();
    let mut mem = vec![0u8; 256];
    let arena = Arena::new(&mut mem);
    let ret = conn.call(b"no_such_method", Obj::Map(&[]), &arena);
    assert_eq!(ret.unwrap_err(), Error::NoEntry);
}

#[test]
fn subscription_pushes_in_order_and_closes_once() {
    let close_count = start_server("test_ticks");

    let (tx, rx) = mpsc::channel();
    let sub = bus::subscribe(
        "test_ticks",
        b"ticks",
        Obj::Map(&[]),
        move |push| {
            let _ = tx.send(push.as_i64().unwrap());
        },
        || {},
    )
    .unwrap();

    for expected in 1..=3i64 {
        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got, expected);
    }

    drop(sub);
    wait_for(|| close_count.load(Ordering::SeqCst) == 1);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(close_count.load(Ordering::SeqCst), 1);
}

#[test]
fn calling_a_subscription_method_as_call_is_invalid() {
    let _ = start_server("test_kind");

    let mut conn = Conn::connect("test_kind").unwrap();
    let mut mem = vec![0u8; 256];
    let arena = Arena::new(&mut mem);
    let ret = conn.call(b"ticks", Obj::Map(&[]), &arena);
    assert_eq!(ret.unwrap_err(), Error::Invalid);
}

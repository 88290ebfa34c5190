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

//! Client helpers for the configuration daemon.
//!
//! The config store itself is a separate daemon; the core only consumes
//! its `read`/`write` methods over the bus.

use tracing::debug;

use crate::bus::Conn;
use crate::error::{Error, Result};
use crate::obj::{Arena, Kv, Obj, ObjVec};

pub const CONFIG_ENDPOINT: &str = "/aws/ggl/ggconfigd";

/// Deepest key path the helpers accept.
pub const MAX_KEY_PATH_DEPTH: usize = 8;

/// Read the value at `key_path`. The result's storage lives in `arena`.
pub fn read<'a>(key_path: &[&[u8]], arena: &Arena<'a>) -> Result<Obj<'a>> {
    let mut conn = Conn::connect(CONFIG_ENDPOINT)?;
    let mut path_storage = [Obj::Null; MAX_KEY_PATH_DEPTH];
    let mut path = ObjVec::new(&mut path_storage);
    for key in key_path {
        path.push(Obj::Buf(key))?;
    }
    let params = [Kv::new(b"key_path", Obj::List(path.as_list()))];
    conn.call(b"read", Obj::Map(&params), arena)
}

/// Read a string-typed config value.
pub fn read_str(key_path: &[&[u8]]) -> Result<String> {
    let mut mem = vec![0u8; 4096];
    let arena = Arena::new(&mut mem);
    let value = read(key_path, &arena)?;
    let buf = value.as_buf().ok_or_else(|| {
        debug!("config value is not a string");
        Error::Parse
    })?;
    String::from_utf8(buf.to_vec()).map_err(|_| Error::Parse)
}

/// Write `value` at `key_path` with the given timestamp (ms since epoch).
pub fn write(key_path: &[&[u8]], value: Obj<'_>, timestamp: i64) -> Result<()> {
    let mut conn = Conn::connect(CONFIG_ENDPOINT)?;
    let mut path_storage = [Obj::Null; MAX_KEY_PATH_DEPTH];
    let mut path = ObjVec::new(&mut path_storage);
    for key in key_path {
        path.push(Obj::Buf(key))?;
    }
    let params = [
        Kv::new(b"key_path", Obj::List(path.as_list())),
        Kv::new(b"value", value),
        Kv::new(b"timeStamp", Obj::I64(timestamp)),
    ];
    let mut mem = vec![0u8; 256];
    let arena = Arena::new(&mut mem);
    conn.call(b"write", Obj::Map(&params), &arena)?;
    Ok(())
}

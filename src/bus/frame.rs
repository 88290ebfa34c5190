/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use std::io::{Read, Write};

use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};
use crate::obj::{Arena, Kv, Obj, MAX_OBJ_DEPTH};

/// Upper bound for one framed message, request or response.
///
/// Oversized frames are rejected with `NoMem` on both sides; the receive
/// path never grows beyond this.
pub const MAX_FRAME_LEN: usize = 10_000;

/// Upper bound for a method name.
pub const MAX_METHOD_LEN: usize = 256;

// Wire tags for the packed value encoding. One tag byte, then
// little-endian fixed-width scalars or u32-length-prefixed payloads.
const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_I64: u8 = 2;
const TAG_F64: u8 = 3;
const TAG_BUF: u8 = 4;
const TAG_LIST: u8 = 5;
const TAG_MAP: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum RequestKind {
    /// Single reply expected.
    Call = 0,
    /// Reply then a server-push stream.
    Sub = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ResponseKind {
    /// The one reply for a call, or the acceptance of a subscription.
    Reply = 0,
    /// A subscription update.
    Push = 1,
    /// Server-side close notification for a subscription.
    Closed = 2,
}

pub struct Request<'a> {
    pub kind: RequestKind,
    pub method: &'a [u8],
    pub params: Obj<'a>,
}

pub struct Response<'a> {
    pub kind: ResponseKind,
    pub error: Option<Error>,
    pub value: Obj<'a>,
}

pub fn encode_request(
    kind: RequestKind,
    method: &[u8],
    params: Obj<'_>,
    out: &mut Vec<u8>,
) -> Result<()> {
    if method.len() > MAX_METHOD_LEN {
        return Err(Error::Range);
    }
    out.clear();
    out.push(kind as u8);
    out.extend_from_slice(&(method.len() as u16).to_le_bytes());
    out.extend_from_slice(method);
    encode_obj(params, out, 0)?;
    if out.len() > MAX_FRAME_LEN {
        return Err(Error::NoMem);
    }
    Ok(())
}

pub fn decode_request<'a>(payload: &'a [u8], arena: &Arena<'a>) -> Result<Request<'a>> {
    let mut r = Reader::new(payload);
    let kind = RequestKind::try_from(r.u8()?).map_err(|_| Error::Parse)?;
    let method_len = usize::from(r.u16()?);
    if method_len > MAX_METHOD_LEN {
        return Err(Error::Range);
    }
    let method = r.bytes(method_len)?;
    let params = decode_obj(&mut r, arena, 0)?;
    Ok(Request {
        kind,
        method,
        params,
    })
}

pub fn encode_response(
    kind: ResponseKind,
    error: Option<Error>,
    value: Obj<'_>,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.clear();
    out.push(kind as u8);
    out.push(error.map_or(0, Error::code));
    encode_obj(value, out, 0)?;
    if out.len() > MAX_FRAME_LEN {
        return Err(Error::NoMem);
    }
    Ok(())
}

pub fn decode_response<'a>(payload: &'a [u8], arena: &Arena<'a>) -> Result<Response<'a>> {
    let mut r = Reader::new(payload);
    let kind = ResponseKind::try_from(r.u8()?).map_err(|_| Error::Parse)?;
    let error = Error::from_code(r.u8()?);
    let value = decode_obj(&mut r, arena, 0)?;
    Ok(Response { kind, error, value })
}

/// Write one length-prefixed frame.
pub fn write_frame(stream: &mut impl Write, payload: &[u8]) -> Result<()> {
    debug_assert!(payload.len() <= MAX_FRAME_LEN);
    stream.write_all(&(payload.len() as u32).to_be_bytes())?;
    stream.write_all(payload)?;
    Ok(())
}

/// Read one length-prefixed frame into `buf`, replacing its contents.
///
/// `NoConn` when the peer has gone away; `NoMem` when the advertised
/// length exceeds [`MAX_FRAME_LEN`].
pub fn read_frame(stream: &mut impl Read, buf: &mut Vec<u8>) -> Result<()> {
    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::NoMem);
    }
    buf.clear();
    buf.resize(len, 0);
    stream.read_exact(buf)?;
    Ok(())
}

fn encode_obj(obj: Obj<'_>, out: &mut Vec<u8>, depth: usize) -> Result<()> {
    if depth > MAX_OBJ_DEPTH {
        return Err(Error::Range);
    }
    match obj {
        Obj::Null => out.push(TAG_NULL),
        Obj::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(b));
        }
        Obj::I64(v) => {
            out.push(TAG_I64);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Obj::F64(v) => {
            out.push(TAG_F64);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Obj::Buf(b) => {
            if b.len() > MAX_FRAME_LEN {
                return Err(Error::NoMem);
            }
            out.push(TAG_BUF);
            out.extend_from_slice(&(b.len() as u32).to_le_bytes());
            out.extend_from_slice(b);
        }
        Obj::List(items) => {
            out.push(TAG_LIST);
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_obj(*item, out, depth + 1)?;
            }
        }
        Obj::Map(pairs) => {
            out.push(TAG_MAP);
            out.extend_from_slice(&(pairs.len() as u32).to_le_bytes());
            for kv in pairs {
                if kv.key.len() > MAX_METHOD_LEN {
                    return Err(Error::Range);
                }
                out.extend_from_slice(&(kv.key.len() as u32).to_le_bytes());
                out.extend_from_slice(kv.key);
                encode_obj(kv.val, out, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Decode one value.
///
/// Buffers are zero-copy views into `payload`; list and map nodes are
/// allocated from `arena`.
fn decode_obj<'a>(r: &mut Reader<'a>, arena: &Arena<'a>, depth: usize) -> Result<Obj<'a>> {
    if depth > MAX_OBJ_DEPTH {
        return Err(Error::Range);
    }
    let tag = r.u8()?;
    match tag {
        TAG_NULL => Ok(Obj::Null),
        TAG_BOOL => Ok(Obj::Bool(r.u8()? != 0)),
        TAG_I64 => Ok(Obj::I64(i64::from_le_bytes(r.array()?))),
        TAG_F64 => Ok(Obj::F64(f64::from_le_bytes(r.array()?))),
        TAG_BUF => {
            let len = r.u32()? as usize;
            Ok(Obj::Buf(r.bytes(len)?))
        }
        TAG_LIST => {
            let count = r.u32()? as usize;
            if count > r.remaining() {
                // Each element is at least one tag byte.
                return Err(Error::Parse);
            }
            let items = arena
                .alloc_slice_fill(count, Obj::Null)
                .ok_or(Error::NoMem)?;
            for slot in items.iter_mut() {
                *slot = decode_obj(r, arena, depth + 1)?;
            }
            Ok(Obj::List(items))
        }
        TAG_MAP => {
            let count = r.u32()? as usize;
            if count > r.remaining() {
                return Err(Error::Parse);
            }
            let empty = Kv {
                key: &[],
                val: Obj::Null,
            };
            let pairs = arena.alloc_slice_fill(count, empty).ok_or(Error::NoMem)?;
            for slot in pairs.iter_mut() {
                let key_len = r.u32()? as usize;
                if key_len > MAX_METHOD_LEN {
                    return Err(Error::Range);
                }
                slot.key = r.bytes(key_len)?;
                slot.val = decode_obj(r, arena, depth + 1)?;
            }
            Ok(Obj::Map(pairs))
        }
        _ => Err(Error::Parse),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn u8(&mut self) -> Result<u8> {
        let b = *self.buf.get(self.pos).ok_or(Error::Parse)?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::Parse);
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }
}

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
use crate::error::{Error, Result};
use crate::obj::{Kv, Obj};

/// Bounded builders over caller-provided storage.
///
/// Each vector wraps `(storage, len)` and fails `NoMem` when full. The
/// `chain_*` variants take an error accumulator: once the accumulator holds
/// an error, further operations are skipped, so a sequence of appends can
/// be issued and the result inspected once at the end.

macro_rules! chain {
    ($err:ident, $op:expr) => {
        if $err.is_ok() {
            *$err = $op;
        }
    };
}

/// Bounded byte builder.
pub struct ByteVec<'a> {
    storage: &'a mut [u8],
    len: usize,
}

impl<'a> ByteVec<'a> {
    pub fn new(storage: &'a mut [u8]) -> Self {
        ByteVec { storage, len: 0 }
    }

    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.len == self.storage.len() {
            return Err(Error::NoMem);
        }
        self.storage[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.storage.len() - self.len {
            return Err(Error::NoMem);
        }
        self.storage[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    pub fn chain_push(&mut self, err: &mut Result<()>, byte: u8) {
        chain!(err, self.push(byte));
    }

    pub fn chain_append(&mut self, err: &mut Result<()>, bytes: &[u8]) {
        chain!(err, self.append(bytes));
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Consume the builder, returning the filled prefix of the storage.
    pub fn into_slice(self) -> &'a mut [u8] {
        let ByteVec { storage, len } = self;
        &mut storage[..len]
    }
}

/// Bounded value-list builder.
pub struct ObjVec<'a> {
    storage: &'a mut [Obj<'a>],
    len: usize,
}

impl<'a> ObjVec<'a> {
    pub fn new(storage: &'a mut [Obj<'a>]) -> Self {
        ObjVec { storage, len: 0 }
    }

    pub fn push(&mut self, obj: Obj<'a>) -> Result<()> {
        if self.len == self.storage.len() {
            return Err(Error::NoMem);
        }
        self.storage[self.len] = obj;
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Obj<'a>> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.storage[self.len])
    }

    pub fn chain_push(&mut self, err: &mut Result<()>, obj: Obj<'a>) {
        chain!(err, self.push(obj));
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_list(&self) -> &[Obj<'a>] {
        &self.storage[..self.len]
    }
}

/// Bounded key-value builder.
pub struct KvVec<'a> {
    storage: &'a mut [Kv<'a>],
    len: usize,
}

impl<'a> KvVec<'a> {
    pub fn new(storage: &'a mut [Kv<'a>]) -> Self {
        KvVec { storage, len: 0 }
    }

    pub fn push(&mut self, kv: Kv<'a>) -> Result<()> {
        if self.len == self.storage.len() {
            return Err(Error::NoMem);
        }
        self.storage[self.len] = kv;
        self.len += 1;
        Ok(())
    }

    pub fn chain_push(&mut self, err: &mut Result<()>, kv: Kv<'a>) {
        chain!(err, self.push(kv));
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_map(&self) -> &[Kv<'a>] {
        &self.storage[..self.len]
    }
}

/// Bounded buffer-list builder.
pub struct BufVec<'a> {
    storage: &'a mut [&'a [u8]],
    len: usize,
}

impl<'a> BufVec<'a> {
    pub fn new(storage: &'a mut [&'a [u8]]) -> Self {
        BufVec { storage, len: 0 }
    }

    pub fn push(&mut self, buf: &'a [u8]) -> Result<()> {
        if self.len == self.storage.len() {
            return Err(Error::NoMem);
        }
        self.storage[self.len] = buf;
        self.len += 1;
        Ok(())
    }

    pub fn chain_push(&mut self, err: &mut Result<()>, buf: &'a [u8]) {
        chain!(err, self.push(buf));
    }

    /// Append every `Buf` element of `list`; any other element type fails
    /// `Invalid`.
    pub fn append_list(&mut self, list: &[Obj<'a>]) -> Result<()> {
        for item in list {
            match item {
                Obj::Buf(b) => self.push(b)?,
                _ => return Err(Error::Invalid),
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bufs(&self) -> &[&'a [u8]] {
        &self.storage[..self.len]
    }
}

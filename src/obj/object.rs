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
use core::fmt;

use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::obj::Arena;

/// Maximum nesting depth accepted by deep copy and the wire codec.
///
/// The value graph is a tree; this bound turns an accidental cycle or a
/// hostile deeply-nested payload into an error instead of a stack overflow.
pub const MAX_OBJ_DEPTH: usize = 16;

/// A generic dynamic value.
///
/// `Buf`, `List` and `Map` carry borrowed views into caller-owned storage,
/// so an `Obj` is a cheap `Copy` handle. Use [`deep_copy`] to move a value's
/// entire transitive storage into an [`Arena`] when it must outlive the
/// buffers it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Obj<'a> {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    /// A byte buffer. Possibly a UTF-8 string.
    Buf(&'a [u8]),
    /// An ordered sequence of values.
    List(&'a [Obj<'a>]),
    /// An ordered sequence of key-value pairs. Key uniqueness is a caller
    /// invariant; lookup is linear first-match.
    Map(&'a [Kv<'a>]),
}

/// A key-value pair used for [`Obj::Map`]. Keys are UTF-8 strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kv<'a> {
    pub key: &'a [u8],
    pub val: Obj<'a>,
}

pub type List<'a> = &'a [Obj<'a>];
pub type Map<'a> = &'a [Kv<'a>];

/// Union tag for [`Obj`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjType {
    Null,
    Bool,
    I64,
    F64,
    Buf,
    List,
    Map,
}

impl fmt::Display for ObjType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::I64 => "i64",
            Self::F64 => "f64",
            Self::Buf => "buf",
            Self::List => "list",
            Self::Map => "map",
        };
        write!(f, "{s}")
    }
}

impl<'a> Kv<'a> {
    pub fn new(key: &'a [u8], val: Obj<'a>) -> Self {
        Kv { key, val }
    }
}

impl<'a> Obj<'a> {
    pub fn obj_type(self) -> ObjType {
        match self {
            Obj::Null => ObjType::Null,
            Obj::Bool(_) => ObjType::Bool,
            Obj::I64(_) => ObjType::I64,
            Obj::F64(_) => ObjType::F64,
            Obj::Buf(_) => ObjType::Buf,
            Obj::List(_) => ObjType::List,
            Obj::Map(_) => ObjType::Map,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Obj::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Obj::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            Obj::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_buf(self) -> Option<&'a [u8]> {
        match self {
            Obj::Buf(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(self) -> Option<List<'a>> {
        match self {
            Obj::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(self) -> Option<Map<'a>> {
        match self {
            Obj::Map(pairs) => Some(pairs),
            _ => None,
        }
    }
}

/// Linear first-match key lookup.
pub fn map_get<'a>(map: Map<'a>, key: &[u8]) -> Option<Obj<'a>> {
    map.iter().find(|kv| kv.key == key).map(|kv| kv.val)
}

/// Recursively copy a value's transitive storage into `arena`.
///
/// Scalar variants are a no-op. On allocation failure the arena keeps
/// whatever was partially copied; the caller must discard the result.
pub fn deep_copy<'dst>(obj: Obj<'_>, arena: &Arena<'dst>) -> Result<Obj<'dst>> {
    deep_copy_at(obj, arena, 0)
}

fn deep_copy_at<'dst>(obj: Obj<'_>, arena: &Arena<'dst>, depth: usize) -> Result<Obj<'dst>> {
    debug_assert!(depth <= MAX_OBJ_DEPTH, "object cycle or excessive nesting");
    if depth > MAX_OBJ_DEPTH {
        return Err(Error::Range);
    }

    match obj {
        Obj::Null => Ok(Obj::Null),
        Obj::Bool(b) => Ok(Obj::Bool(b)),
        Obj::I64(v) => Ok(Obj::I64(v)),
        Obj::F64(v) => Ok(Obj::F64(v)),
        Obj::Buf(b) => {
            let mem = arena.alloc_copy_slice(b).ok_or_else(nomem)?;
            Ok(Obj::Buf(mem))
        }
        Obj::List(items) => {
            let dst = arena
                .alloc_slice_fill(items.len(), Obj::Null)
                .ok_or_else(nomem)?;
            for (slot, item) in dst.iter_mut().zip(items) {
                *slot = deep_copy_at(*item, arena, depth + 1)?;
            }
            Ok(Obj::List(dst))
        }
        Obj::Map(pairs) => {
            let empty = Kv {
                key: &[],
                val: Obj::Null,
            };
            let dst = arena
                .alloc_slice_fill(pairs.len(), empty)
                .ok_or_else(nomem)?;
            for (slot, kv) in dst.iter_mut().zip(pairs) {
                slot.key = arena.alloc_copy_slice(kv.key).ok_or_else(nomem)?;
                slot.val = deep_copy_at(kv.val, arena, depth + 1)?;
            }
            Ok(Obj::Map(dst))
        }
    }
}

fn nomem() -> Error {
    debug!("insufficient memory when making deep copy");
    Error::NoMem
}

impl Serialize for Obj<'_> {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Obj::Null => serializer.serialize_unit(),
            Obj::Bool(b) => serializer.serialize_bool(b),
            Obj::I64(v) => serializer.serialize_i64(v),
            Obj::F64(v) => serializer.serialize_f64(v),
            Obj::Buf(b) => match core::str::from_utf8(b) {
                Ok(text) => serializer.serialize_str(text),
                Err(_) => serializer.serialize_bytes(b),
            },
            Obj::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Obj::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for kv in pairs {
                    map.serialize_entry(&String::from_utf8_lossy(kv.key), &kv.val)?;
                }
                map.end()
            }
        }
    }
}

/// Implementation of `Display` for `Obj`, rendered as JSON for log output.
impl fmt::Display for Obj<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("<unprintable>"),
        }
    }
}

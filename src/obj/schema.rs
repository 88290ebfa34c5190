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
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::obj::{map_get, Map, Obj, ObjType};

/// One entry of a declarative map-shape check.
///
/// Binds a named key to a typed output slot. `expected = None` accepts any
/// value type. RPC entrypoints declare their whole parameter shape as an
/// array of entries and call [`map_validate`] once.
pub struct SchemaEntry<'e, 'a> {
    key: &'e [u8],
    required: bool,
    expected: Option<ObjType>,
    out: &'e mut Option<Obj<'a>>,
}

impl<'e, 'a> SchemaEntry<'e, 'a> {
    pub fn required(
        key: &'e [u8],
        expected: Option<ObjType>,
        out: &'e mut Option<Obj<'a>>,
    ) -> Self {
        SchemaEntry {
            key,
            required: true,
            expected,
            out,
        }
    }

    pub fn optional(
        key: &'e [u8],
        expected: Option<ObjType>,
        out: &'e mut Option<Obj<'a>>,
    ) -> Self {
        SchemaEntry {
            key,
            required: false,
            expected,
            out,
        }
    }
}

/// Check `map` against `schema`, binding each found value to its entry's
/// output slot.
///
/// A missing required key fails `NoEntry`. A present value whose type
/// differs from the entry's expectation fails `Parse`. A missing optional
/// key leaves its slot `None`.
pub fn map_validate<'a>(map: Map<'a>, schema: &mut [SchemaEntry<'_, 'a>]) -> Result<()> {
    for entry in schema {
        let found = map_get(map, entry.key);
        let val = match found {
            Some(val) => val,
            None => {
                if entry.required {
                    debug!(
                        key = %String::from_utf8_lossy(entry.key),
                        "map missing required key"
                    );
                    return Err(Error::NoEntry);
                }
                trace!(
                    key = %String::from_utf8_lossy(entry.key),
                    "missing optional key"
                );
                *entry.out = None;
                continue;
            }
        };

        if let Some(expected) = entry.expected {
            if val.obj_type() != expected {
                debug!(
                    key = %String::from_utf8_lossy(entry.key),
                    expected = %expected,
                    got = %val.obj_type(),
                    "key is of invalid type"
                );
                return Err(Error::Parse);
            }
        }

        *entry.out = Some(val);
    }

    Ok(())
}

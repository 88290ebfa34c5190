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
use std::io::Read;

use crate::error::{Error, Result};

/// Largest value the 1-4 byte variable-length encoding can carry.
pub const MAX_REMAINING_LENGTH: u32 = 0x0FFF_FFFF;

/// Append the 1-4 byte variable-length encoding of `value`.
///
/// Fails `Range` for values above [`MAX_REMAINING_LENGTH`].
pub fn encode_remaining_length(value: u32, out: &mut Vec<u8>) -> Result<()> {
    if value > MAX_REMAINING_LENGTH {
        return Err(Error::Range);
    }
    let mut value = value;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return Ok(());
        }
    }
}

/// Streaming decode from a buffer prefix.
///
/// `Ok(Some((value, consumed)))` when a complete encoding is present,
/// `Ok(None)` when more bytes are needed, `Parse` on a malformed encoding
/// (more than 4 continuation bytes).
pub fn decode_remaining_length(buf: &[u8]) -> Result<Option<(u32, usize)>> {
    let mut multiplier = 1u32;
    let mut value = 0u32;

    for (i, &byte) in buf.iter().take(4).enumerate() {
        value += u32::from(byte & 0x7F) * multiplier;
        if (byte & 0x80) == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }

    if buf.len() < 4 {
        Ok(None)
    } else {
        Err(Error::Parse)
    }
}

/// Decode directly from a byte stream, one byte at a time.
pub fn read_remaining_length(reader: &mut impl Read) -> Result<u32> {
    let mut multiplier = 1u32;
    let mut value = 0u32;

    for _ in 0..4 {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        value += u32::from(byte[0] & 0x7F) * multiplier;
        if (byte[0] & 0x80) == 0 {
            return Ok(value);
        }
        multiplier *= 128;
    }

    Err(Error::Parse)
}

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
use tracing::debug;

use crate::error::{Error, Result};

/// Subslice with both endpoints clamped into `[0, len]`.
///
/// Empty when `end` precedes `start` after clamping.
pub fn substr(buf: &[u8], start: usize, end: usize) -> &[u8] {
    let start = start.min(buf.len());
    let end = end.min(buf.len());
    if end >= start {
        &buf[start..end]
    } else {
        &buf[start..start]
    }
}

/// Parse a decimal `i64` from bytes.
///
/// Accepts an optional leading `-` followed by one or more ASCII digits.
/// No whitespace, no `+`. Fails `Invalid` on empty or non-digit input and
/// `Range` on overflow; every multiply-and-add is checked before commit.
pub fn str_to_int64(s: &[u8]) -> Result<i64> {
    let (sign, digits): (i64, &[u8]) = match s.first() {
        Some(b'-') => (-1, &s[1..]),
        _ => (1, s),
    };

    if digits.is_empty() {
        debug!("insufficient characters when parsing int64");
        return Err(Error::Invalid);
    }

    let mut value: i64 = 0;
    for &c in digits {
        if !c.is_ascii_digit() {
            debug!(character = c, "invalid character when parsing int64");
            return Err(Error::Invalid);
        }
        value = value.checked_mul(10).ok_or(Error::Range)?;
        value = value
            .checked_add(sign * i64::from(c - b'0'))
            .ok_or(Error::Range)?;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int64_min_max() {
        assert_eq!(str_to_int64(b"9223372036854775807"), Ok(i64::MAX));
        assert_eq!(str_to_int64(b"-9223372036854775808"), Ok(i64::MIN));
        assert_eq!(str_to_int64(b"9223372036854775808"), Err(Error::Range));
        assert_eq!(str_to_int64(b"-9223372036854775809"), Err(Error::Range));
    }
}

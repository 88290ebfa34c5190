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
use num_enum::TryFromPrimitive;

/// Error kinds, representing class of error.
///
/// This is a single flat set shared by every layer of the runtime. Handlers
/// return a kind, the core-bus transport carries it verbatim in the reply
/// frame, and clients observe the same kind the server produced. Internal
/// helpers use the same set throughout; there is no separate exception path.
///
/// The numeric representation is the on-wire reply code. `0` is reserved
/// for success and never appears as an `Error` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, thiserror::Error)]
#[repr(u8)]
pub enum Error {
    /// Generic failure, no other category fits
    #[error("Failure")]
    Failure = 1,
    /// Transient failure, safe to retry
    #[error("Retry")]
    Retry = 2,
    /// Request cannot be handled at the time
    #[error("Busy")]
    Busy = 3,
    /// System is in irrecoverably broken state
    #[error("Fatal")]
    Fatal = 4,
    /// Request is invalid or malformed
    #[error("Invalid")]
    Invalid = 5,
    /// Known request, not implemented in this build
    #[error("Unsupported")]
    Unsupported = 6,
    /// Data well-formed but wrong shape or type
    #[error("Parse")]
    Parse = 7,
    /// Request or data outside of allowable range
    #[error("Range")]
    Range = 8,
    /// Resource exhaustion (arena, slot table, store)
    #[error("NoMem")]
    NoMem = 9,
    /// Dependent service unreachable
    #[error("NoConn")]
    NoConn = 10,
    /// Unknown entry or target requested
    #[error("NoEntry")]
    NoEntry = 11,
    /// Invalid or missing configuration
    #[error("Config")]
    Config = 12,
    /// Remote endpoint rejected the call
    #[error("Remote")]
    Remote = 13,
    /// Sentinel meaning "no result yet"; used by cross-thread handoff
    #[error("Expected")]
    Expected = 14,
}

impl Error {
    /// On-wire reply code. `0` means success and is produced by the
    /// transport, not by this type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a non-zero reply code. Unknown codes collapse to `Failure`
    /// so a newer peer cannot wedge an older client.
    pub fn from_code(code: u8) -> Option<Error> {
        if code == 0 {
            return None;
        }
        Some(Error::try_from(code).unwrap_or(Error::Failure))
    }
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Busy,
            ErrorKind::NotFound => Error::NoEntry,
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => Error::NoConn,
            ErrorKind::OutOfMemory => Error::NoMem,
            ErrorKind::InvalidInput => Error::Invalid,
            ErrorKind::PermissionDenied => Error::Fatal,
            _ => Error::Failure,
        }
    }
}

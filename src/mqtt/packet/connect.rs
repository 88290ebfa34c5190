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
use getset::{CopyGetters, Getters};
use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};
use crate::mqtt::packet::remaining_length::encode_remaining_length;
use crate::mqtt::packet::{write_str, write_u16, PacketType};

/// MQTT 3.1.1 CONNECT packet.
///
/// Carries the protocol name/level, the connect flags, the keep-alive
/// interval in seconds, and the client identifier. Wills and credentials
/// are not used by this client.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Connect {
    #[getset(get = "pub")]
    client_id: Vec<u8>,
    #[getset(get_copy = "pub")]
    keep_alive: u16,
    #[getset(get_copy = "pub")]
    clean_session: bool,
}

impl Connect {
    pub fn builder() -> ConnectBuilder {
        ConnectBuilder::default()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut variable = Vec::with_capacity(12 + self.client_id.len());
        // Protocol name "MQTT", protocol level 4.
        write_str(&mut variable, b"MQTT").expect("constant fits");
        variable.push(4);
        let mut flags = 0u8;
        if self.clean_session {
            flags |= 0x02;
        }
        variable.push(flags);
        write_u16(&mut variable, self.keep_alive);
        write_str(&mut variable, &self.client_id).expect("validated in build");

        let mut out = Vec::with_capacity(variable.len() + 5);
        out.push((PacketType::Connect as u8) << 4);
        encode_remaining_length(variable.len() as u32, &mut out).expect("validated in build");
        out.extend_from_slice(&variable);
        out
    }
}

#[derive(Debug, Default)]
pub struct ConnectBuilder {
    client_id: Vec<u8>,
    keep_alive: u16,
    clean_session: bool,
}

impl ConnectBuilder {
    pub fn client_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.client_id = id.into();
        self
    }

    pub fn keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = seconds;
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.clean_session = clean;
        self
    }

    pub fn build(self) -> Result<Connect> {
        if self.client_id.is_empty() || self.client_id.len() > u16::MAX as usize {
            return Err(Error::Range);
        }
        Ok(Connect {
            client_id: self.client_id,
            keep_alive: self.keep_alive,
            clean_session: self.clean_session,
        })
    }
}

/// CONNACK return codes (MQTT 3.1.1 table 3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ConnackReturnCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUserNameOrPassword = 4,
    NotAuthorized = 5,
}

/// MQTT 3.1.1 CONNACK packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
pub struct Connack {
    #[getset(get_copy = "pub")]
    session_present: bool,
    #[getset(get_copy = "pub")]
    return_code: ConnackReturnCode,
}

impl Connack {
    pub fn parse(body: &[u8]) -> Result<Connack> {
        if body.len() != 2 {
            return Err(Error::Parse);
        }
        if body[0] & !0x01 != 0 {
            return Err(Error::Parse);
        }
        let return_code = ConnackReturnCode::try_from(body[1]).map_err(|_| Error::Parse)?;
        Ok(Connack {
            session_present: body[0] & 0x01 != 0,
            return_code,
        })
    }

    pub fn accepted(&self) -> bool {
        self.return_code == ConnackReturnCode::Accepted
    }
}

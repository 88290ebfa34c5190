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
use crate::mqtt::packet::PacketType;

/// Acknowledgment packets whose body is a single packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Puback,
    Pubrec,
    Pubrel,
    Pubcomp,
}

impl AckKind {
    fn first_byte(self) -> u8 {
        match self {
            // PUBREL carries the reserved 0b0010 flags.
            AckKind::Puback => (PacketType::Puback as u8) << 4,
            AckKind::Pubrec => (PacketType::Pubrec as u8) << 4,
            AckKind::Pubrel => ((PacketType::Pubrel as u8) << 4) | 0x02,
            AckKind::Pubcomp => (PacketType::Pubcomp as u8) << 4,
        }
    }
}

pub fn encode_packet_id_only(kind: AckKind, packet_id: u16) -> [u8; 4] {
    let id = packet_id.to_be_bytes();
    [kind.first_byte(), 2, id[0], id[1]]
}

pub fn parse_packet_id_only(body: &[u8]) -> Result<u16> {
    if body.len() != 2 {
        return Err(Error::Parse);
    }
    let id = u16::from_be_bytes([body[0], body[1]]);
    if id == 0 {
        return Err(Error::Parse);
    }
    Ok(id)
}

pub fn encode_pingreq() -> [u8; 2] {
    [(PacketType::Pingreq as u8) << 4, 0]
}

pub fn encode_disconnect() -> [u8; 2] {
    [(PacketType::Disconnect as u8) << 4, 0]
}

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

//! MQTT 3.1.1 packet codec, client-relevant subset.

mod qos;
pub use qos::Qos;

mod remaining_length;
pub use remaining_length::{
    decode_remaining_length, encode_remaining_length, read_remaining_length, MAX_REMAINING_LENGTH,
};

mod connect;
pub use connect::{Connack, ConnackReturnCode, Connect, ConnectBuilder};

mod publish;
pub(crate) use publish::set_dup_flag;
pub use publish::{Publish, PublishBuilder};

mod subscribe;
pub use subscribe::{SubEntry, Suback, Subscribe, Unsubscribe};

mod ack;
pub use ack::{
    encode_disconnect, encode_packet_id_only, encode_pingreq, parse_packet_id_only, AckKind,
};

use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};

/// Largest packet accepted from the broker.
///
/// Matches the fixed network buffer of the connection; anything larger
/// fails `NoMem` and tears the session down.
pub const MAX_INBOUND_PACKET_LEN: usize = 5000;

/// MQTT control packet types (fixed header bits 4-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Puback = 4,
    Pubrec = 5,
    Pubrel = 6,
    Pubcomp = 7,
    Subscribe = 8,
    Suback = 9,
    Unsubscribe = 10,
    Unsuback = 11,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
}

/// An inbound packet, parsed from one fixed header + body.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connack(Connack),
    Publish(Publish),
    Puback { packet_id: u16 },
    Pubrec { packet_id: u16 },
    Pubrel { packet_id: u16 },
    Pubcomp { packet_id: u16 },
    Suback(Suback),
    Unsuback { packet_id: u16 },
    Pingresp,
}

/// Parse a complete inbound packet from its first fixed-header byte and
/// the body that followed the remaining-length field.
pub fn parse_packet(first_byte: u8, body: &[u8]) -> Result<Packet> {
    let packet_type = PacketType::try_from(first_byte >> 4).map_err(|_| Error::Parse)?;
    let flags = first_byte & 0x0F;

    match packet_type {
        PacketType::Connack => Ok(Packet::Connack(Connack::parse(body)?)),
        PacketType::Publish => Ok(Packet::Publish(Publish::parse(flags, body)?)),
        PacketType::Puback => Ok(Packet::Puback {
            packet_id: parse_packet_id_only(body)?,
        }),
        PacketType::Pubrec => Ok(Packet::Pubrec {
            packet_id: parse_packet_id_only(body)?,
        }),
        PacketType::Pubrel => Ok(Packet::Pubrel {
            packet_id: parse_packet_id_only(body)?,
        }),
        PacketType::Pubcomp => Ok(Packet::Pubcomp {
            packet_id: parse_packet_id_only(body)?,
        }),
        PacketType::Suback => Ok(Packet::Suback(Suback::parse(body)?)),
        PacketType::Unsuback => Ok(Packet::Unsuback {
            packet_id: parse_packet_id_only(body)?,
        }),
        PacketType::Pingresp => {
            if !body.is_empty() {
                return Err(Error::Parse);
            }
            Ok(Packet::Pingresp)
        }
        _ => Err(Error::Parse),
    }
}

pub(crate) fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write a length-prefixed UTF-8 string field.
pub(crate) fn write_str(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    if bytes.len() > u16::MAX as usize {
        return Err(Error::Range);
    }
    write_u16(out, bytes.len() as u16);
    out.extend_from_slice(bytes);
    Ok(())
}

pub(crate) fn read_u16(body: &[u8], pos: &mut usize) -> Result<u16> {
    if body.len() < *pos + 2 {
        return Err(Error::Parse);
    }
    let value = u16::from_be_bytes([body[*pos], body[*pos + 1]]);
    *pos += 2;
    Ok(value)
}

pub(crate) fn read_str<'a>(body: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = usize::from(read_u16(body, pos)?);
    if body.len() < *pos + len {
        return Err(Error::Parse);
    }
    let out = &body[*pos..*pos + len];
    *pos += len;
    Ok(out)
}

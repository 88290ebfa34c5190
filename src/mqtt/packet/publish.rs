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

use crate::error::{Error, Result};
use crate::mqtt::packet::remaining_length::encode_remaining_length;
use crate::mqtt::packet::{read_str, read_u16, write_str, write_u16, PacketType, Qos};

/// MQTT 3.1.1 PUBLISH packet.
///
/// Fixed-header flags carry RETAIN (bit 0), QoS (bits 1-2) and DUP
/// (bit 3). A packet identifier is present iff QoS > 0. Topic names must
/// not contain wildcards; that is enforced by the broker, not here.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Publish {
    #[getset(get_copy = "pub")]
    dup: bool,
    #[getset(get_copy = "pub")]
    qos: Qos,
    #[getset(get_copy = "pub")]
    retain: bool,
    #[getset(get = "pub")]
    topic: Vec<u8>,
    #[getset(get_copy = "pub")]
    packet_id: Option<u16>,
    #[getset(get = "pub")]
    payload: Vec<u8>,
}

impl Publish {
    pub fn builder() -> PublishBuilder {
        PublishBuilder::default()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = (self.qos as u8) << 1;
        if self.retain {
            flags |= 0x01;
        }
        if self.dup {
            flags |= 0x08;
        }

        let id_len = if self.packet_id.is_some() { 2 } else { 0 };
        let remaining = 2 + self.topic.len() + id_len + self.payload.len();

        let mut out = Vec::with_capacity(remaining + 5);
        out.push(((PacketType::Publish as u8) << 4) | flags);
        encode_remaining_length(remaining as u32, &mut out).expect("validated in build");
        write_str(&mut out, &self.topic).expect("validated in build");
        if let Some(id) = self.packet_id {
            write_u16(&mut out, id);
        }
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn parse(flags: u8, body: &[u8]) -> Result<Publish> {
        let qos = Qos::try_from((flags >> 1) & 0x03).map_err(|_| Error::Parse)?;
        let mut pos = 0usize;
        let topic = read_str(body, &mut pos)?.to_vec();
        let packet_id = match qos {
            Qos::AtMostOnce => None,
            _ => {
                let id = read_u16(body, &mut pos)?;
                if id == 0 {
                    return Err(Error::Parse);
                }
                Some(id)
            }
        };
        Ok(Publish {
            dup: flags & 0x08 != 0,
            qos,
            retain: flags & 0x01 != 0,
            topic,
            packet_id,
            payload: body[pos..].to_vec(),
        })
    }
}

/// Set the DUP bit on an already serialized PUBLISH, for retransmission.
/// Other packet types pass through unchanged.
pub(crate) fn set_dup_flag(serialized: &mut [u8]) {
    if let Some(first) = serialized.first_mut() {
        if *first >> 4 == PacketType::Publish as u8 {
            *first |= 0x08;
        }
    }
}

#[derive(Debug, Default)]
pub struct PublishBuilder {
    dup: bool,
    qos: Option<Qos>,
    retain: bool,
    topic: Vec<u8>,
    packet_id: Option<u16>,
    payload: Vec<u8>,
}

impl PublishBuilder {
    pub fn topic(mut self, topic: impl Into<Vec<u8>>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn qos(mut self, qos: Qos) -> Self {
        self.qos = Some(qos);
        self
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn dup(mut self, dup: bool) -> Self {
        self.dup = dup;
        self
    }

    pub fn packet_id(mut self, id: u16) -> Self {
        self.packet_id = Some(id);
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn build(self) -> Result<Publish> {
        if self.topic.is_empty() || self.topic.len() > u16::MAX as usize {
            return Err(Error::Range);
        }
        let qos = self.qos.unwrap_or(Qos::AtMostOnce);
        match qos {
            Qos::AtMostOnce => {
                if self.packet_id.is_some() {
                    return Err(Error::Invalid);
                }
            }
            _ => {
                if self.packet_id.unwrap_or(0) == 0 {
                    return Err(Error::Invalid);
                }
            }
        }
        Ok(Publish {
            dup: self.dup,
            qos,
            retain: self.retain,
            topic: self.topic,
            packet_id: self.packet_id,
            payload: self.payload,
        })
    }
}

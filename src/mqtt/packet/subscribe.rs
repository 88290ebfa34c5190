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
use crate::mqtt::packet::remaining_length::encode_remaining_length;
use crate::mqtt::packet::{read_u16, write_str, write_u16, PacketType, Qos};

/// One topic filter + requested QoS in a SUBSCRIBE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEntry {
    pub filter: Vec<u8>,
    pub qos: Qos,
}

/// MQTT 3.1.1 SUBSCRIBE packet. A single packet carries the whole filter
/// batch; fixed-header flags are the reserved 0b0010.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_id: u16,
    pub entries: Vec<SubEntry>,
}

impl Subscribe {
    pub fn new(packet_id: u16, entries: Vec<SubEntry>) -> Result<Subscribe> {
        if packet_id == 0 || entries.is_empty() {
            return Err(Error::Invalid);
        }
        for entry in &entries {
            if entry.filter.is_empty() || entry.filter.len() > u16::MAX as usize {
                return Err(Error::Range);
            }
        }
        Ok(Subscribe { packet_id, entries })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let remaining: usize = 2 + self
            .entries
            .iter()
            .map(|e| 2 + e.filter.len() + 1)
            .sum::<usize>();

        let mut out = Vec::with_capacity(remaining + 5);
        out.push(((PacketType::Subscribe as u8) << 4) | 0x02);
        encode_remaining_length(remaining as u32, &mut out).expect("validated in new");
        write_u16(&mut out, self.packet_id);
        for entry in &self.entries {
            write_str(&mut out, &entry.filter).expect("validated in new");
            out.push(entry.qos as u8);
        }
        out
    }
}

/// MQTT 3.1.1 UNSUBSCRIBE packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub packet_id: u16,
    pub filters: Vec<Vec<u8>>,
}

impl Unsubscribe {
    pub fn new(packet_id: u16, filters: Vec<Vec<u8>>) -> Result<Unsubscribe> {
        if packet_id == 0 || filters.is_empty() {
            return Err(Error::Invalid);
        }
        for filter in &filters {
            if filter.is_empty() || filter.len() > u16::MAX as usize {
                return Err(Error::Range);
            }
        }
        Ok(Unsubscribe { packet_id, filters })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let remaining: usize = 2 + self.filters.iter().map(|f| 2 + f.len()).sum::<usize>();

        let mut out = Vec::with_capacity(remaining + 5);
        out.push(((PacketType::Unsubscribe as u8) << 4) | 0x02);
        encode_remaining_length(remaining as u32, &mut out).expect("validated in new");
        write_u16(&mut out, self.packet_id);
        for filter in &self.filters {
            write_str(&mut out, filter).expect("validated in new");
        }
        out
    }
}

/// MQTT 3.1.1 SUBACK packet. One return code per requested filter;
/// `0x80` marks a rejected filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suback {
    pub packet_id: u16,
    pub return_codes: Vec<u8>,
}

impl Suback {
    pub fn parse(body: &[u8]) -> Result<Suback> {
        let mut pos = 0usize;
        let packet_id = read_u16(body, &mut pos)?;
        if packet_id == 0 || pos == body.len() {
            return Err(Error::Parse);
        }
        let return_codes = body[pos..].to_vec();
        for &code in &return_codes {
            if code > 2 && code != 0x80 {
                return Err(Error::Parse);
            }
        }
        Ok(Suback {
            packet_id,
            return_codes,
        })
    }

    pub fn any_rejected(&self) -> bool {
        self.return_codes.iter().any(|&code| code == 0x80)
    }
}

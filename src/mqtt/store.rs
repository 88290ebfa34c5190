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
use arrayvec::ArrayVec;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Byte capacity of the unacked-publish backing buffer.
pub const UNACKED_STORE_BUFFER_LEN: usize = 15 * 1024;

/// Maximum number of in-flight publish records.
pub const MAX_UNACKED_RECORDS: usize = 10;

#[derive(Debug, Clone, Copy)]
struct Record {
    packet_id: u16,
    offset: usize,
    len: usize,
}

/// Store for serialized publishes awaiting broker acknowledgment.
///
/// Records are packed contiguously into a fixed backing buffer in
/// insertion order of their packet ids. Removal compacts forward: every
/// later record's bytes shift down by the freed record's length, so the
/// invariant "records are contiguous and in insertion order" holds after
/// any sequence of operations.
pub struct UnackedStore {
    records: ArrayVec<Record, MAX_UNACKED_RECORDS>,
    buffer: Vec<u8>,
    used: usize,
}

impl UnackedStore {
    pub fn new() -> Self {
        UnackedStore {
            records: ArrayVec::new(),
            buffer: vec![0u8; UNACKED_STORE_BUFFER_LEN],
            used: 0,
        }
    }

    /// Append a serialized packet at the high-water mark.
    ///
    /// Packet ids are nonzero and unique among live records. Fails `NoMem`
    /// when either the record table or the byte buffer is full, leaving
    /// the store unchanged.
    pub fn store(&mut self, packet_id: u16, serialized: &[u8]) -> Result<()> {
        debug_assert!(packet_id != 0);
        if packet_id == 0 || self.contains(packet_id) {
            return Err(Error::Invalid);
        }
        if self.records.is_full() {
            error!("no space left in record table to store additional packet");
            return Err(Error::NoMem);
        }
        if serialized.len() > self.buffer.len() - self.used {
            error!("not enough space in buffer to store one more packet");
            return Err(Error::NoMem);
        }

        let offset = self.used;
        self.buffer[offset..offset + serialized.len()].copy_from_slice(serialized);
        self.records.push(Record {
            packet_id,
            offset,
            len: serialized.len(),
        });
        self.used += serialized.len();
        debug!(packet_id, "stored publish");
        Ok(())
    }

    /// Serialized bytes for retransmission. Linear search.
    pub fn retrieve(&self, packet_id: u16) -> Option<&[u8]> {
        let record = self.records.iter().find(|r| r.packet_id == packet_id)?;
        Some(&self.buffer[record.offset..record.offset + record.len])
    }

    pub fn contains(&self, packet_id: u16) -> bool {
        self.records.iter().any(|r| r.packet_id == packet_id)
    }

    /// Remove a record and compact forward. Returns false when the id is
    /// not present.
    pub fn clear(&mut self, packet_id: u16) -> bool {
        let index = match self.records.iter().position(|r| r.packet_id == packet_id) {
            Some(index) => index,
            None => {
                debug!(packet_id, "no packet with this id to clear");
                return false;
            }
        };

        let freed = self.records[index];
        let tail_start = freed.offset + freed.len;
        self.buffer.copy_within(tail_start..self.used, freed.offset);
        self.used -= freed.len;

        self.records.remove(index);
        for record in &mut self.records[index..] {
            record.offset -= freed.len;
        }

        debug!(packet_id, "cleared publish");
        true
    }

    /// Byte offset of a live record in the backing buffer.
    pub fn offset_of(&self, packet_id: u16) -> Option<usize> {
        self.records
            .iter()
            .find(|r| r.packet_id == packet_id)
            .map(|r| r.offset)
    }

    /// Live records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &[u8])> {
        self.records
            .iter()
            .map(|r| (r.packet_id, &self.buffer[r.offset..r.offset + r.len]))
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn bytes_used(&self) -> usize {
        self.used
    }
}

impl Default for UnackedStore {
    fn default() -> Self {
        Self::new()
    }
}

//! Reference header codec with a size-bounded FIFO dynamic table.
//!
//! This is a stand-in for a real QPACK/HPACK codec: no static table and no
//! Huffman coding, just enough table behavior for the acknowledgment protocol
//! to matter.
//!
//! # Table Rules
//!
//! - Entry size is `name + value + 32` octets; the table holds at most
//!   `table_size` octets
//! - Inserting past the budget evicts the oldest entries first
//! - Entries carry the absolute index they were inserted at (u32, wrapping)
//!   and the block that inserted them
//!
//! # Referencing Rules
//!
//! An entry inserted by block `b` may be referenced only if
//! - `b <= commit_epoch` (the decoder is known to have processed it), or
//! - `b >= packet_epoch` (it travels in the same packet as the new block)
//!
//! Otherwise the header is re-sent as a literal.
//!
//! # Block Format
//!
//! ```text
//! 0x80 | index (u32 BE)                                   indexed
//! 0x40 | name_len (u16 BE) | name | value_len (u16 BE) | value   literal, inserted
//! 0x00 | name_len (u16 BE) | name | value_len (u16 BE) | value   literal
//! ```

use crate::codec::{EncodedBlock, EncodedSize, Header, HeaderCodec, IndexingStrategy};
use crate::error::{CodecError, Result};
use crate::seqn::SequenceNumber;
use bytes::{BufMut, BytesMut};
use std::collections::VecDeque;
use tracing::trace;

/// Per-entry overhead added to name and value lengths
pub const ENTRY_OVERHEAD: u64 = 32;

const OP_INDEXED: u8 = 0x80;
const OP_LITERAL_INDEXED: u8 = 0x40;
const OP_LITERAL: u8 = 0x00;

#[derive(Debug, Clone)]
struct Entry {
    header: Header,
    /// Unwrapped sequence number of the inserting block
    inserted_by: i64,
    size: u64,
}

/// Size-bounded FIFO table codec.
#[derive(Debug, Clone)]
pub struct FifoTableCodec {
    /// Oldest entry at the front
    entries: VecDeque<Entry>,

    /// Absolute index of `entries.front()`
    first_index: u32,

    table_size: u64,
    used: u64,
    strategy: IndexingStrategy,

    commit_epoch: i64,

    /// First block of the packet currently being filled (unwrapped)
    packet_epoch: i64,

    /// Last block encoded, wire and unwrapped forms
    last_block: Option<(SequenceNumber, i64)>,

    /// A table resize evicted entries since the last encode
    resize_evicted: bool,
}

impl FifoTableCodec {
    /// Create a codec with a `table_size` byte budget.
    pub fn new(table_size: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            first_index: 0,
            table_size: u64::from(table_size),
            used: 0,
            strategy: IndexingStrategy::default(),
            commit_epoch: -1,
            packet_epoch: 0,
            last_block: None,
            resize_evicted: false,
        }
    }

    /// Number of entries currently in the table.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Bytes currently used by table entries.
    pub fn used_bytes(&self) -> u64 {
        self.used
    }

    fn unwrap_seqn(&self, seqn: SequenceNumber) -> i64 {
        match self.last_block {
            Some((wire, unwrapped)) => unwrapped + i64::from(wire.distance_to(seqn)),
            None => i64::from(seqn.0),
        }
    }

    fn is_referenceable(&self, entry: &Entry) -> bool {
        entry.inserted_by <= self.commit_epoch || entry.inserted_by >= self.packet_epoch
    }

    /// Absolute index of the newest referenceable entry matching `header`.
    fn lookup(&self, header: &Header) -> Option<u32> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .find(|(_, entry)| entry.header == *header && self.is_referenceable(entry))
            .map(|(pos, _)| self.first_index.wrapping_add(pos as u32))
    }

    fn evict_oldest(&mut self) {
        if let Some(entry) = self.entries.pop_front() {
            trace!(index = self.first_index, name = %entry.header.name, "evicting table entry");
            self.used -= entry.size;
            self.first_index = self.first_index.wrapping_add(1);
        }
    }

    /// Insert `header`, evicting as needed. Returns (inserted, evicted).
    fn insert(&mut self, header: &Header, block: i64) -> (bool, bool) {
        let size = (header.name.len() + header.value.len()) as u64 + ENTRY_OVERHEAD;
        if size > self.table_size {
            return (false, false);
        }

        let mut evicted = false;
        while self.used + size > self.table_size {
            self.evict_oldest();
            evicted = true;
        }

        self.entries.push_back(Entry {
            header: header.clone(),
            inserted_by: block,
            size,
        });
        self.used += size;
        (true, evicted)
    }
}

fn put_literal(buf: &mut BytesMut, op: u8, header: &Header) {
    buf.put_u8(op);
    buf.put_u16(header.name.len() as u16);
    buf.put_slice(header.name.as_bytes());
    buf.put_u16(header.value.len() as u16);
    buf.put_slice(header.value.as_bytes());
}

fn check_field_len(len: usize) -> Result<()> {
    let max = usize::from(u16::MAX);
    if len > max {
        return Err(CodecError::FieldTooLong { len, max }.into());
    }
    Ok(())
}

impl HeaderCodec for FifoTableCodec {
    fn encode(&mut self, seqn: SequenceNumber, headers: &[Header]) -> Result<EncodedBlock> {
        for header in headers {
            check_field_len(header.name.len())?;
            check_field_len(header.value.len())?;
        }

        let block = self.unwrap_seqn(seqn);
        self.last_block = Some((seqn, block));

        let mut evicted = std::mem::take(&mut self.resize_evicted);
        let mut buf = BytesMut::new();
        let mut uncompressed = 0;

        for header in headers {
            uncompressed += header.uncompressed_size();

            if let Some(index) = self.lookup(header) {
                buf.put_u8(OP_INDEXED);
                buf.put_u32(index);
                continue;
            }

            if self.strategy.should_index(header) {
                let (inserted, evicted_now) = self.insert(header, block);
                evicted |= evicted_now;
                if inserted {
                    put_literal(&mut buf, OP_LITERAL_INDEXED, header);
                    continue;
                }
            }

            put_literal(&mut buf, OP_LITERAL, header);
        }

        trace!(%seqn, entries = self.entries.len(), used = self.used, evicted, "encoded block");

        let compressed = buf.len() as u64;
        Ok(EncodedBlock {
            payload: buf.freeze(),
            evicted,
            size: EncodedSize {
                uncompressed,
                compressed,
            },
        })
    }

    fn set_table_size(&mut self, size: u32) {
        self.table_size = u64::from(size);
        while self.used > self.table_size {
            self.evict_oldest();
            self.resize_evicted = true;
        }
    }

    fn set_indexing_strategy(&mut self, strategy: IndexingStrategy) {
        self.strategy = strategy;
    }

    fn set_commit_epoch(&mut self, epoch: i64) {
        self.commit_epoch = self.commit_epoch.max(epoch);
    }

    fn on_flush_boundary(&mut self) {
        self.packet_epoch = match self.last_block {
            Some((_, block)) => block + 1,
            None => 0,
        };
    }
}

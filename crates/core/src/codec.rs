//! Header codec interface.
//!
//! The compression itself (table lookup, literal coding) sits behind
//! [`HeaderCodec`]. The protocol layer only needs three things from it: the
//! encoded payload, whether encoding evicted table entries, and the byte
//! counts for statistics. [`crate::table::FifoTableCodec`] is the reference
//! implementation used by the simulator.

use crate::error::Result;
use crate::seqn::SequenceNumber;
use bytes::Bytes;

/// One HTTP header field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Size of this header in HTTP/1 line form (`name: value\r\n`).
    pub fn uncompressed_size(&self) -> u64 {
        (self.name.len() + self.value.len() + 4) as u64
    }
}

/// Which headers the encoder may insert into the dynamic table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexingStrategy {
    /// Index every header
    #[default]
    All,
    /// Index everything except `:path`, whose values rarely repeat
    NoPath,
}

impl IndexingStrategy {
    /// Whether `header` should be inserted into the table.
    pub fn should_index(self, header: &Header) -> bool {
        match self {
            IndexingStrategy::All => true,
            IndexingStrategy::NoPath => header.name != ":path",
        }
    }
}

/// Byte counts reported for one encode call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodedSize {
    pub uncompressed: u64,
    pub compressed: u64,
}

/// Output of one encode call.
#[derive(Debug, Clone)]
pub struct EncodedBlock {
    /// Codec payload, without the sequence-number prefix
    pub payload: Bytes,

    /// Encoding evicted one or more table entries
    pub evicted: bool,

    pub size: EncodedSize,
}

/// Stateful header codec shared by the encoder side of a scheme.
pub trait HeaderCodec {
    /// Compress `headers` as block `seqn` against the dynamic table.
    fn encode(&mut self, seqn: SequenceNumber, headers: &[Header]) -> Result<EncodedBlock>;

    /// Set the dynamic table budget in bytes.
    fn set_table_size(&mut self, size: u32);

    fn set_indexing_strategy(&mut self, strategy: IndexingStrategy);

    /// Every block up to and including `epoch` has been acknowledged.
    fn set_commit_epoch(&mut self, epoch: i64);

    /// A packet was flushed; later blocks travel separately from earlier ones.
    fn on_flush_boundary(&mut self);
}

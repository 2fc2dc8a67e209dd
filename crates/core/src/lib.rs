//! qpack-sim-core: acknowledgment and ordering protocol for incremental
//! header compression over a reordering network
//!
//! A paired encoder and decoder share dynamic-table state. Header blocks and
//! their acknowledgments may arrive out of order, so this library keeps the
//! two sides consistent:
//! - Numbers every encoded block with a wrapping 16-bit sequence number
//! - Aggregates out-of-order acks into a monotone commit epoch
//! - Flags each block as safe or unsafe to decode out of order, depending on
//!   whether encoding it evicted table entries
//!
//! # Architecture
//!
//! - `seqn`: Sequence numbers and their assigner
//! - `wire`: Big-endian sequence-number prefix on encoded blocks
//! - `flags`: Per-frame out-of-order flag
//! - `ack`: Typed acks and the commit-epoch aggregator
//! - `codec`: Header codec interface
//! - `table`: Reference FIFO-table codec
//! - `queue`: Delivery queue interface and reference queue
//! - `scheme`: The QPACK-style scheme tying it all together
//! - `network`: Seeded link simulator on a virtual clock
//! - `simulator`: Event loop over a scheme and two links
//! - `stats`: Observable simulation statistics
//!
//! # Design Principles
//!
//! - **Out of order is normal**: late or early acks are data, never errors
//! - **Fatal teardown**: a scheme dropped with queued blocks panics
//! - **Deterministic**: Seeded randomness and a virtual clock make runs reproducible
//! - **Single-threaded**: every piece of state is owned by one scheme instance

pub mod ack;
pub mod codec;
pub mod error;
pub mod flags;
pub mod network;
pub mod queue;
pub mod scheme;
pub mod seqn;
pub mod simulator;
pub mod stats;
pub mod table;
pub mod wire;

// Re-export commonly used types
pub use ack::{AckAggregator, AckOutcome, QpackAck};
pub use codec::{Header, HeaderCodec, IndexingStrategy};
pub use error::{Error, Result};
pub use flags::FrameFlags;
pub use scheme::{CompressionScheme, QpackScheme};
pub use seqn::{SequenceAssigner, SequenceNumber};
pub use stats::SimStats;

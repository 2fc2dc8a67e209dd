//! Error types for the qpack-sim system.
//!
//! Recoverable failures are returned as structured errors. Protocol invariant
//! violations (a scheme torn down with blocks still queued) are not errors:
//! they abort the simulation, see [`crate::scheme::QpackScheme`].
//!
//! Out-of-order acknowledgments are normal protocol behavior and never show up
//! here.

use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Wire: sequence-number prefix handling on encoded blocks
/// - Codec: header compression against the dynamic table
/// - Queue: handing blocks to the delivery queue
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed block on the wire
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Header codec failure
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Delivery queue rejected a block
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors in the sequence-number framing of encoded blocks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Block is too short to carry the sequence-number prefix
    #[error("block too short: need at least {required} bytes, got {actual}")]
    BlockTooShort { required: usize, actual: usize },
}

/// Header codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A header name or value does not fit the 16-bit length field
    #[error("header field too long: {len} bytes (max {max})")]
    FieldTooLong { len: usize, max: usize },
}

/// Delivery queue errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Block was already processed, buffered, or is behind the in-order cursor
    #[error("stale header block seqn={seqn} (next expected {next_expected})")]
    StaleBlock { seqn: u16, next_expected: u16 },
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;

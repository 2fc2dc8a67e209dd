//! Sequence-number framing of encoded header blocks.
//!
//! # Block Format
//!
//! ```text
//! +-------------------+
//! | seqn (2 bytes)    |  u16 big-endian sequence number
//! +-------------------+
//! | payload           |  codec output, opaque to this layer
//! | (variable)        |
//! +-------------------+
//! ```
//!
//! The receiver strips exactly [`SEQN_PREFIX_SIZE`] bytes before handing the
//! remaining payload and its length to the delivery queue.

use crate::error::{Result, WireError};
use crate::seqn::SequenceNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the sequence-number prefix in bytes
pub const SEQN_PREFIX_SIZE: usize = 2;

/// Prefix a codec payload with its sequence number.
pub fn prefix_block(seqn: SequenceNumber, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(SEQN_PREFIX_SIZE + payload.len());
    buf.put_u16(seqn.0);
    buf.put_slice(payload);
    buf.freeze()
}

/// Split a received block into its sequence number and payload.
///
/// # Errors
/// `WireError::BlockTooShort` if the block cannot hold the prefix.
pub fn strip_block(mut block: Bytes) -> Result<(SequenceNumber, Bytes)> {
    if block.len() < SEQN_PREFIX_SIZE {
        return Err(WireError::BlockTooShort {
            required: SEQN_PREFIX_SIZE,
            actual: block.len(),
        }
        .into());
    }

    let seqn = SequenceNumber(block.get_u16());
    Ok((seqn, block))
}

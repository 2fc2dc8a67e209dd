//! Decoder-side delivery queue for header blocks.
//!
//! Header blocks reach the decoder in network order, not send order. The
//! queue decides when each block may be processed:
//!
//! - the block is next in sequence: process it, then drain every buffered
//!   block that became contiguous
//! - the block carries `allow_ooo`: process it immediately, out of order
//! - otherwise: buffer it until the gap fills (a head-of-line block)
//!
//! # Bounded State
//!
//! Buffered blocks are held until their predecessors arrive. The scheme that
//! owns the queue must see [`DeliveryQueue::queued_bytes`] return to zero
//! before it is torn down.
//!
//! # Thread Safety
//!
//! This structure is NOT thread-safe. One queue per simulated connection.

use crate::error::{QueueError, Result};
use crate::seqn::SequenceNumber;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Receiver of header blocks stripped of their sequence-number prefix.
pub trait DeliveryQueue {
    /// Hand over block `seqn` whose payload is `length` bytes long.
    fn enqueue(
        &mut self,
        seqn: SequenceNumber,
        payload: Bytes,
        length: usize,
        allow_ooo: bool,
    ) -> Result<()>;

    /// Bytes held waiting for earlier blocks.
    fn queued_bytes(&self) -> usize;

    /// Number of blocks that had to wait for an earlier block.
    fn hol_block_count(&self) -> u32;

    /// Take the blocks released since the last call, in processing order.
    fn take_delivered(&mut self) -> Vec<DeliveredBlock>;
}

/// A block the queue released for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredBlock {
    pub seqn: SequenceNumber,
    pub payload: Bytes,

    /// Processed before all earlier blocks
    pub out_of_order: bool,
}

#[derive(Debug)]
struct BufferedBlock {
    seqn: SequenceNumber,
    payload: Bytes,
    length: usize,
}

/// Reference delivery queue with head-of-line accounting.
#[derive(Debug, Default)]
pub struct HeaderBlockQueue {
    /// Next block to process in order (unwrapped)
    next_expected: i64,

    /// Blocks waiting for a gap to fill, keyed by unwrapped seqn
    buffered: BTreeMap<i64, BufferedBlock>,

    /// Blocks ahead of the cursor that were already processed out of order
    processed_ahead: BTreeSet<i64>,

    queued_bytes: usize,
    hol_blocks: u32,

    /// Blocks released for processing, in processing order
    delivered: Vec<DeliveredBlock>,
}

impl HeaderBlockQueue {
    /// Create an empty queue expecting block 0 first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number the in-order cursor is waiting for.
    pub fn next_expected(&self) -> SequenceNumber {
        SequenceNumber(self.next_expected as u16)
    }

    fn release(&mut self, seqn: SequenceNumber, payload: Bytes, out_of_order: bool) {
        self.delivered.push(DeliveredBlock {
            seqn,
            payload,
            out_of_order,
        });
    }

    /// Move the cursor past every block that is now contiguous.
    fn advance_cursor(&mut self) {
        loop {
            if self.processed_ahead.remove(&self.next_expected) {
                self.next_expected += 1;
            } else if let Some(block) = self.buffered.remove(&self.next_expected) {
                self.queued_bytes -= block.length;
                debug!(seqn = %block.seqn, "releasing buffered block");
                self.release(block.seqn, block.payload, false);
                self.next_expected += 1;
            } else {
                break;
            }
        }
    }
}

impl DeliveryQueue for HeaderBlockQueue {
    fn enqueue(
        &mut self,
        seqn: SequenceNumber,
        payload: Bytes,
        length: usize,
        allow_ooo: bool,
    ) -> Result<()> {
        let next_wire = self.next_expected();
        let ahead = next_wire.distance_to(seqn);
        let unwrapped = self.next_expected + i64::from(ahead);

        if ahead >= SequenceNumber::HALF
            || self.buffered.contains_key(&unwrapped)
            || self.processed_ahead.contains(&unwrapped)
        {
            return Err(QueueError::StaleBlock {
                seqn: seqn.0,
                next_expected: next_wire.0,
            }
            .into());
        }

        if ahead == 0 {
            self.release(seqn, payload, false);
            self.next_expected += 1;
            self.advance_cursor();
        } else if allow_ooo {
            debug!(%seqn, expected = %next_wire, "processing block out of order");
            self.release(seqn, payload, true);
            self.processed_ahead.insert(unwrapped);
        } else {
            debug!(%seqn, expected = %next_wire, length, "head-of-line blocked");
            self.buffered.insert(
                unwrapped,
                BufferedBlock {
                    seqn,
                    payload,
                    length,
                },
            );
            self.queued_bytes += length;
            self.hol_blocks += 1;
        }

        Ok(())
    }

    fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    fn hol_block_count(&self) -> u32 {
        self.hol_blocks
    }

    fn take_delivered(&mut self) -> Vec<DeliveredBlock> {
        std::mem::take(&mut self.delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn block(len: usize) -> Bytes {
        Bytes::from(vec![0xAB; len])
    }

    fn enqueue(queue: &mut HeaderBlockQueue, seqn: u16, len: usize, ooo: bool) -> Result<()> {
        queue.enqueue(SequenceNumber(seqn), block(len), len, ooo)
    }

    fn delivered_seqns(queue: &mut HeaderBlockQueue) -> Vec<u16> {
        queue.take_delivered().iter().map(|b| b.seqn.0).collect()
    }

    #[test]
    fn test_in_order_blocks() {
        let mut queue = HeaderBlockQueue::new();
        for n in 0..3 {
            enqueue(&mut queue, n, 10, false).unwrap();
        }
        assert_eq!(delivered_seqns(&mut queue), vec![0, 1, 2]);
        assert_eq!(queue.hol_block_count(), 0);
        assert_eq!(queue.queued_bytes(), 0);
    }

    #[test]
    fn test_out_of_order_blocks_buffered() {
        let mut queue = HeaderBlockQueue::new();
        enqueue(&mut queue, 2, 5, false).unwrap();
        enqueue(&mut queue, 1, 7, false).unwrap();

        assert!(delivered_seqns(&mut queue).is_empty());
        assert_eq!(queue.queued_bytes(), 12);
        assert_eq!(queue.hol_block_count(), 2);

        enqueue(&mut queue, 0, 3, false).unwrap();
        assert_eq!(delivered_seqns(&mut queue), vec![0, 1, 2]);
        assert_eq!(queue.queued_bytes(), 0);
        assert_eq!(queue.next_expected(), SequenceNumber(3));
    }

    #[test]
    fn test_allow_ooo_skips_the_wait() {
        let mut queue = HeaderBlockQueue::new();
        for n in (0..5).rev() {
            enqueue(&mut queue, n, 4, true).unwrap();
        }

        let delivered = queue.take_delivered();
        let seqns: Vec<u16> = delivered.iter().map(|b| b.seqn.0).collect();
        assert_eq!(seqns, vec![4, 3, 2, 1, 0]);
        assert!(delivered[..4].iter().all(|b| b.out_of_order));
        assert!(!delivered[4].out_of_order);

        assert_eq!(queue.hol_block_count(), 0);
        assert_eq!(queue.queued_bytes(), 0);
        assert_eq!(queue.next_expected(), SequenceNumber(5));
    }

    #[test]
    fn test_mixed_ooo_and_blocked() {
        let mut queue = HeaderBlockQueue::new();
        enqueue(&mut queue, 1, 4, true).unwrap();
        enqueue(&mut queue, 2, 6, false).unwrap();
        assert_eq!(delivered_seqns(&mut queue), vec![1]);
        assert_eq!(queue.queued_bytes(), 6);

        // 0 releases the cursor past 1 (already processed) and releases 2
        enqueue(&mut queue, 0, 4, false).unwrap();
        assert_eq!(delivered_seqns(&mut queue), vec![0, 2]);
        assert_eq!(queue.next_expected(), SequenceNumber(3));
        assert_eq!(queue.hol_block_count(), 1);
    }

    #[test]
    fn test_stale_block_rejected() {
        let mut queue = HeaderBlockQueue::new();
        enqueue(&mut queue, 0, 1, false).unwrap();

        let result = enqueue(&mut queue, 0, 1, false);
        assert!(matches!(
            result,
            Err(Error::Queue(QueueError::StaleBlock {
                seqn: 0,
                next_expected: 1
            }))
        ));
    }

    #[test]
    fn test_duplicate_buffered_block_rejected() {
        let mut queue = HeaderBlockQueue::new();
        enqueue(&mut queue, 3, 1, false).unwrap();
        assert!(enqueue(&mut queue, 3, 1, false).is_err());

        enqueue(&mut queue, 5, 1, true).unwrap();
        assert!(enqueue(&mut queue, 5, 1, true).is_err());
        assert_eq!(queue.queued_bytes(), 1);
    }

    #[test]
    fn test_cursor_wraps() {
        let mut queue = HeaderBlockQueue::new();
        for n in 0..=u16::MAX {
            enqueue(&mut queue, n, 0, false).unwrap();
        }
        queue.take_delivered();

        enqueue(&mut queue, 1, 2, false).unwrap();
        enqueue(&mut queue, 0, 2, false).unwrap();
        assert_eq!(delivered_seqns(&mut queue), vec![0, 1]);
        assert_eq!(queue.next_expected(), SequenceNumber(2));
    }
}

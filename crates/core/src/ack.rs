//! Acknowledgment aggregation.
//!
//! The decoder acknowledges every header block it processes. Acks travel back
//! over the same reorder-prone network, so they may arrive in any order. The
//! encoder may only rely on table state that was *contiguously* acknowledged:
//! the aggregator turns the ack stream into a commit epoch, the highest
//! sequence number such that it and every earlier block have been acked.
//!
//! # State Machine
//!
//! ```text
//! ack s == epoch + 1   -> epoch = s, then drain pending while front == epoch + 1
//! ack s >  epoch + 1   -> insert s into pending (sorted, unique)
//! ack s <= epoch       -> ignored (stale or duplicate)
//! ```
//!
//! Initial state: epoch = -1, pending empty. There is no terminal state.
//!
//! # Wrap-Around
//!
//! Sequence numbers are 16 bits on the wire, but the epoch lives on an
//! unwrapped `i64` axis so it keeps increasing past 65535. An incoming number
//! is placed on that axis relative to `epoch + 1`: a forward distance below
//! [`SequenceNumber::HALF`] is ahead, anything else is behind.

use crate::seqn::SequenceNumber;
use std::collections::VecDeque;
use tracing::debug;

/// Acknowledgment for one header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QpackAck {
    /// Sequence number of the acknowledged block
    pub seqn: SequenceNumber,
}

impl QpackAck {
    /// Create an ack for `seqn`.
    pub fn new(seqn: SequenceNumber) -> Self {
        Self { seqn }
    }
}

/// Result of applying one ack to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The commit epoch advanced to `epoch`
    Advanced { epoch: i64 },
    /// The ack arrived ahead of a gap and was buffered
    Pending,
    /// The ack was already buffered
    Duplicate,
    /// The ack is at or behind the commit epoch
    Stale,
}

/// Aggregates out-of-order acks into a monotone commit epoch.
#[derive(Debug, Clone)]
pub struct AckAggregator {
    /// Highest contiguously acknowledged sequence number (unwrapped)
    commit_epoch: i64,

    /// Acks received ahead of a gap, sorted ascending, all > commit_epoch + 1
    pending: VecDeque<i64>,
}

impl AckAggregator {
    /// Sentinel epoch meaning "nothing committed".
    pub const NOTHING_COMMITTED: i64 = -1;

    /// Create an aggregator with nothing committed.
    pub fn new() -> Self {
        Self {
            commit_epoch: Self::NOTHING_COMMITTED,
            pending: VecDeque::new(),
        }
    }

    /// Current commit epoch.
    pub fn commit_epoch(&self) -> i64 {
        self.commit_epoch
    }

    /// Acks buffered behind a gap, ascending.
    pub fn pending(&self) -> impl Iterator<Item = i64> + '_ {
        self.pending.iter().copied()
    }

    /// Number of acks buffered behind a gap.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply one acknowledged sequence number.
    pub fn apply(&mut self, seqn: SequenceNumber) -> AckOutcome {
        let expected = self.commit_epoch + 1;
        // expected >= 0, so the cast reduces it modulo 2^16
        let ahead = SequenceNumber(expected as u16).distance_to(seqn);

        if ahead >= SequenceNumber::HALF {
            debug!(%seqn, epoch = self.commit_epoch, "ignoring stale ack");
            return AckOutcome::Stale;
        }

        let unwrapped = expected + i64::from(ahead);

        if ahead == 0 {
            self.commit_epoch = unwrapped;
            while self.pending.front() == Some(&(self.commit_epoch + 1)) {
                self.commit_epoch += 1;
                self.pending.pop_front();
            }
            debug!(%seqn, epoch = self.commit_epoch, "commit epoch advanced");
            return AckOutcome::Advanced {
                epoch: self.commit_epoch,
            };
        }

        match self.pending.binary_search(&unwrapped) {
            Ok(_) => {
                debug!(%seqn, "duplicate pending ack");
                AckOutcome::Duplicate
            }
            Err(pos) => {
                self.pending.insert(pos, unwrapped);
                debug!(%seqn, epoch = self.commit_epoch, pending = self.pending.len(), "ack ahead of gap");
                AckOutcome::Pending
            }
        }
    }
}

impl Default for AckAggregator {
    fn default() -> Self {
        Self::new()
    }
}

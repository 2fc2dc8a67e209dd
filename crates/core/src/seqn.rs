//! Sequence numbers for encoded header blocks.
//!
//! Every block the encoder produces gets a 16-bit sequence number, issued in
//! strictly increasing send order and wrapping modulo 65536. The number
//! identifies the block for its whole lifetime: it prefixes the block on the
//! wire, keys the decoder's delivery queue, and comes back in the ack.

use std::fmt;

/// Sequence number of one encoded header block.
///
/// Not `Ord`: after a wrap, numerically smaller can mean later.
/// Compare with [`distance_to`](Self::distance_to).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SequenceNumber(pub u16);

impl SequenceNumber {
    /// Half of the sequence space. Forward distances below this are treated as
    /// "ahead", everything else as "behind".
    pub const HALF: u16 = 1 << 15;

    /// The number following this one, wrapping at 2^16.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Forward distance from `self` to `other` modulo 2^16.
    ///
    /// `a.distance_to(a.next()) == 1`, and `a.distance_to(a) == 0`.
    pub fn distance_to(self, other: Self) -> u16 {
        other.0.wrapping_sub(self.0)
    }

    /// Big-endian wire representation.
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl From<u16> for SequenceNumber {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues sequence numbers for outbound blocks.
///
/// Scoped to one scheme instance; the first number issued is 0.
#[derive(Debug, Clone, Default)]
pub struct SequenceAssigner {
    next: SequenceNumber,
}

impl SequenceAssigner {
    /// Create an assigner starting at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assigner whose first issued number is `first`.
    pub fn starting_at(first: SequenceNumber) -> Self {
        Self { next: first }
    }

    /// Return the next sequence number and advance the counter.
    pub fn next(&mut self) -> SequenceNumber {
        let seqn = self.next;
        self.next = seqn.next();
        seqn
    }

    /// The number the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> SequenceNumber {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assigner_starts_at_zero() {
        let mut assigner = SequenceAssigner::new();
        assert_eq!(assigner.next(), SequenceNumber(0));
        assert_eq!(assigner.next(), SequenceNumber(1));
        assert_eq!(assigner.peek(), SequenceNumber(2));
    }

    #[test]
    fn test_assigner_wraps() {
        let mut assigner = SequenceAssigner::starting_at(SequenceNumber(u16::MAX - 1));
        assert_eq!(assigner.next(), SequenceNumber(u16::MAX - 1));
        assert_eq!(assigner.next(), SequenceNumber(u16::MAX));
        assert_eq!(assigner.next(), SequenceNumber(0));
        assert_eq!(assigner.next(), SequenceNumber(1));
    }

    #[test]
    fn test_distance_across_wrap() {
        let a = SequenceNumber(u16::MAX);
        assert_eq!(a.distance_to(SequenceNumber(0)), 1);
        assert_eq!(a.distance_to(SequenceNumber(4)), 5);
        assert_eq!(SequenceNumber(4).distance_to(a), u16::MAX - 4);
        assert_eq!(a.distance_to(a), 0);
    }

    #[test]
    fn test_be_bytes() {
        assert_eq!(SequenceNumber(0x1234).to_be_bytes(), [0x12, 0x34]);
    }
}

//! QPACK-style compression scheme: the protocol glue between a header codec
//! on the encoder side and a delivery queue on the decoder side.
//!
//! # Data Flow
//!
//! ```text
//! encode:  SequenceAssigner -> HeaderCodec -> FrameFlags + [seqn | payload]
//! decode:  [seqn | payload] -> strip prefix -> DeliveryQueue
//! acks:    decoder -> get_ack -> (network) -> recv_ack -> AckAggregator -> codec
//! ```
//!
//! # Lifecycle
//!
//! One scheme per simulated connection. Dropping a scheme whose delivery queue
//! still holds bytes means the simulation ended with undelivered blocks; that
//! is a fatal consistency violation and panics.

use crate::ack::{AckAggregator, AckOutcome, QpackAck};
use crate::codec::{Header, HeaderCodec, IndexingStrategy};
use crate::error::Result;
use crate::flags::FrameFlags;
use crate::queue::{DeliveryQueue, HeaderBlockQueue};
use crate::seqn::{SequenceAssigner, SequenceNumber};
use crate::stats::SimStats;
use crate::table::FifoTableCodec;
use crate::wire;
use bytes::Bytes;
use std::fmt;
use tracing::{debug, error};

/// A header compression scheme driven by the simulator.
///
/// Each scheme defines its own acknowledgment type, so an ack can only ever
/// be handed back to the kind of scheme that produced it.
pub trait CompressionScheme {
    type Ack: Copy + fmt::Debug;

    /// Build the ack the decoder sends for block `seqn`.
    fn get_ack(&self, seqn: SequenceNumber) -> Self::Ack;

    /// Apply an ack that arrived at the encoder.
    fn recv_ack(&mut self, ack: Self::Ack) -> AckOutcome;

    /// Encode one request's headers into a wire block.
    fn encode(&mut self, headers: &[Header], stats: &mut SimStats) -> Result<(FrameFlags, Bytes)>;

    /// Hand a received wire block to the decoder side. Returns its seqn.
    fn decode(
        &mut self,
        flags: FrameFlags,
        block: Bytes,
        stats: &mut SimStats,
    ) -> Result<SequenceNumber>;

    /// Blocks the decoder side had to hold behind an earlier block.
    fn hol_block_count(&self) -> u32;

    /// Sequence numbers of blocks the decoder finished since the last call.
    fn take_processed(&mut self) -> Vec<SequenceNumber>;

    /// The simulation loop flushed a packet.
    fn on_packet_flushed(&mut self);
}

/// QPACK-style scheme over a codec `C` and a delivery queue `Q`.
pub struct QpackScheme<C = FifoTableCodec, Q = HeaderBlockQueue>
where
    Q: DeliveryQueue,
{
    assigner: SequenceAssigner,
    codec: C,
    queue: Q,
    acks: AckAggregator,
}

impl QpackScheme {
    /// Scheme with the reference codec and queue and a `table_size` budget.
    pub fn with_table_size(table_size: u32) -> Self {
        Self::new(
            FifoTableCodec::new(table_size),
            HeaderBlockQueue::new(),
            table_size,
        )
    }
}

impl<C: HeaderCodec, Q: DeliveryQueue> QpackScheme<C, Q> {
    /// Create a scheme, configuring `codec` for a `table_size` byte table.
    ///
    /// `:path` is never indexed: its values rarely repeat and would only
    /// churn the table.
    pub fn new(mut codec: C, queue: Q, table_size: u32) -> Self {
        codec.set_indexing_strategy(IndexingStrategy::NoPath);
        codec.set_table_size(table_size);
        Self {
            assigner: SequenceAssigner::new(),
            codec,
            queue,
            acks: AckAggregator::new(),
        }
    }

    /// Highest contiguously acknowledged sequence number (unwrapped).
    pub fn commit_epoch(&self) -> i64 {
        self.acks.commit_epoch()
    }

    pub fn acks(&self) -> &AckAggregator {
        &self.acks
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }
}

impl<C: HeaderCodec, Q: DeliveryQueue> CompressionScheme for QpackScheme<C, Q> {
    type Ack = QpackAck;

    fn get_ack(&self, seqn: SequenceNumber) -> QpackAck {
        debug!(%seqn, "sending ack");
        QpackAck::new(seqn)
    }

    fn recv_ack(&mut self, ack: QpackAck) -> AckOutcome {
        debug!(seqn = %ack.seqn, "received ack");
        let outcome = self.acks.apply(ack.seqn);
        if let AckOutcome::Advanced { epoch } = outcome {
            self.codec.set_commit_epoch(epoch);
        }
        outcome
    }

    fn encode(&mut self, headers: &[Header], stats: &mut SimStats) -> Result<(FrameFlags, Bytes)> {
        // The number is only consumed once the codec succeeds, so a failed
        // encode leaves no gap in the sequence.
        let seqn = self.assigner.peek();
        let block = self.codec.encode(seqn, headers)?;
        self.assigner.next();

        stats.requests += 1;
        stats.uncompressed += block.size.uncompressed;
        stats.compressed += block.size.compressed;

        let flags = FrameFlags::from_eviction(block.evicted);
        if flags.allow_ooo {
            stats.ooo_allowed += 1;
        } else {
            stats.evictions += 1;
        }

        debug!(%seqn, evicted = block.evicted, compressed = block.size.compressed, "encoded header block");
        Ok((flags, wire::prefix_block(seqn, &block.payload)))
    }

    fn decode(
        &mut self,
        flags: FrameFlags,
        block: Bytes,
        stats: &mut SimStats,
    ) -> Result<SequenceNumber> {
        let (seqn, payload) = wire::strip_block(block)?;
        let length = payload.len();
        debug!(%seqn, allow_ooo = flags.allow_ooo, length, "decoding header block");

        self.queue.enqueue(seqn, payload, length, flags.allow_ooo)?;

        let queued = self.queue.queued_bytes();
        if queued > stats.max_queue_buffer_bytes {
            stats.max_queue_buffer_bytes = queued;
        }
        Ok(seqn)
    }

    fn hol_block_count(&self) -> u32 {
        self.queue.hol_block_count()
    }

    fn take_processed(&mut self) -> Vec<SequenceNumber> {
        self.queue
            .take_delivered()
            .into_iter()
            .map(|block| block.seqn)
            .collect()
    }

    fn on_packet_flushed(&mut self) {
        self.codec.on_flush_boundary();
    }
}

impl<C, Q: DeliveryQueue> Drop for QpackScheme<C, Q> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let queued = self.queue.queued_bytes();
        if queued != 0 {
            error!(queued, "scheme torn down with undelivered header blocks");
        }
        assert_eq!(queued, 0, "delivery queue not empty at teardown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EncodedBlock, EncodedSize};
    use crate::error::{CodecError, Error, WireError};

    /// Codec that reports evictions from a script and records what it is told.
    #[derive(Default)]
    struct ScriptedCodec {
        evictions: Vec<bool>,
        calls: usize,
        encoded: Vec<SequenceNumber>,
        epochs: Vec<i64>,
        flushes: usize,
        table_size: Option<u32>,
        strategy: Option<IndexingStrategy>,
        fail_next: bool,
    }

    impl ScriptedCodec {
        fn with_evictions(evictions: &[bool]) -> Self {
            Self {
                evictions: evictions.to_vec(),
                ..Default::default()
            }
        }
    }

    impl HeaderCodec for ScriptedCodec {
        fn encode(&mut self, seqn: SequenceNumber, headers: &[Header]) -> Result<EncodedBlock> {
            if std::mem::take(&mut self.fail_next) {
                return Err(CodecError::FieldTooLong { len: 1, max: 0 }.into());
            }
            let evicted = self.evictions.get(self.calls).copied().unwrap_or(false);
            self.calls += 1;
            self.encoded.push(seqn);
            Ok(EncodedBlock {
                payload: Bytes::from(vec![seqn.0 as u8; headers.len() + 1]),
                evicted,
                size: EncodedSize {
                    uncompressed: 100,
                    compressed: headers.len() as u64 + 1,
                },
            })
        }

        fn set_table_size(&mut self, size: u32) {
            self.table_size = Some(size);
        }

        fn set_indexing_strategy(&mut self, strategy: IndexingStrategy) {
            self.strategy = Some(strategy);
        }

        fn set_commit_epoch(&mut self, epoch: i64) {
            self.epochs.push(epoch);
        }

        fn on_flush_boundary(&mut self) {
            self.flushes += 1;
        }
    }

    fn scripted(evictions: &[bool]) -> QpackScheme<ScriptedCodec, HeaderBlockQueue> {
        QpackScheme::new(
            ScriptedCodec::with_evictions(evictions),
            HeaderBlockQueue::new(),
            4096,
        )
    }

    fn request() -> Vec<Header> {
        vec![Header::new(":method", "GET"), Header::new(":path", "/")]
    }

    #[test]
    fn test_new_configures_codec() {
        let scheme = scripted(&[]);
        assert_eq!(scheme.codec().table_size, Some(4096));
        assert_eq!(scheme.codec().strategy, Some(IndexingStrategy::NoPath));
        assert_eq!(scheme.commit_epoch(), -1);
    }

    #[test]
    fn test_flags_follow_scripted_evictions() {
        let pattern = [false, true, false, false, true, true, false];
        let mut scheme = scripted(&pattern);
        let mut stats = SimStats::new();

        let mut blocks = Vec::new();
        for &evicted in &pattern {
            let (flags, block) = scheme.encode(&request(), &mut stats).unwrap();
            assert_eq!(flags.allow_ooo, !evicted);
            blocks.push((flags, block));
        }
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.ooo_allowed, 4);

        for (flags, block) in blocks {
            scheme.decode(flags, block, &mut stats).unwrap();
        }
    }

    #[test]
    fn test_encode_prefixes_sequence_number() {
        let mut scheme = scripted(&[]);
        let mut stats = SimStats::new();

        for expected in 0..3u16 {
            let (_, block) = scheme.encode(&request(), &mut stats).unwrap();
            assert_eq!(&block[..2], &expected.to_be_bytes());
            assert_eq!(block.len(), 2 + 3);
            scheme.decode(FrameFlags::default(), block, &mut stats).unwrap();
        }

        assert_eq!(stats.requests, 3);
        assert_eq!(stats.uncompressed, 300);
        assert_eq!(stats.compressed, 9);
    }

    #[test]
    fn test_failed_encode_does_not_consume_seqn() {
        let mut scheme = scripted(&[]);
        let mut stats = SimStats::new();
        scheme.codec.fail_next = true;

        assert!(scheme.encode(&request(), &mut stats).is_err());
        assert_eq!(stats.requests, 0);

        let (_, block) = scheme.encode(&request(), &mut stats).unwrap();
        assert_eq!(scheme.codec().encoded, vec![SequenceNumber(0)]);
        scheme.decode(FrameFlags::default(), block, &mut stats).unwrap();
    }

    #[test]
    fn test_reverse_delivery_without_evictions_has_no_hol() {
        let mut scheme = QpackScheme::with_table_size(4096);
        let mut stats = SimStats::new();

        let mut frames = Vec::new();
        for i in 0..5 {
            let headers = vec![
                Header::new(":method", "GET"),
                Header::new(":authority", "example.com"),
                Header::new(":path", format!("/item/{i}")),
            ];
            frames.push(scheme.encode(&headers, &mut stats).unwrap());
        }
        assert!(frames.iter().all(|(flags, _)| flags.allow_ooo));

        for (flags, block) in frames.into_iter().rev() {
            scheme.decode(flags, block, &mut stats).unwrap();
        }
        assert_eq!(scheme.hol_block_count(), 0);
        assert_eq!(stats.max_queue_buffer_bytes, 0);
    }

    #[test]
    fn test_decode_tracks_max_queued_bytes() {
        let mut scheme = scripted(&[true, true, true]);
        let mut stats = SimStats::new();

        let frames: Vec<_> = (0..3)
            .map(|_| scheme.encode(&request(), &mut stats).unwrap())
            .collect();

        // deliver 2, 1, 0: both later blocks must wait
        let mut seqns = Vec::new();
        for (flags, block) in frames.into_iter().rev() {
            seqns.push(scheme.decode(flags, block, &mut stats).unwrap());
        }
        assert_eq!(seqns, vec![SequenceNumber(2), SequenceNumber(1), SequenceNumber(0)]);
        assert_eq!(stats.max_queue_buffer_bytes, 6);
        assert_eq!(scheme.hol_block_count(), 2);
        assert_eq!(scheme.queue().queued_bytes(), 0);
        assert_eq!(
            scheme.take_processed(),
            vec![SequenceNumber(0), SequenceNumber(1), SequenceNumber(2)]
        );
        assert!(scheme.take_processed().is_empty());
    }

    #[test]
    fn test_decode_rejects_truncated_block() {
        let mut scheme = scripted(&[]);
        let mut stats = SimStats::new();
        let result = scheme.decode(FrameFlags::default(), Bytes::from_static(&[9]), &mut stats);
        assert!(matches!(
            result,
            Err(Error::Wire(WireError::BlockTooShort { .. }))
        ));
    }

    #[test]
    fn test_acks_push_commit_epoch_to_codec() {
        let mut scheme = scripted(&[]);

        let ack = scheme.get_ack(SequenceNumber(0));
        assert_eq!(scheme.recv_ack(ack), AckOutcome::Advanced { epoch: 0 });
        assert_eq!(scheme.recv_ack(QpackAck::new(SequenceNumber(2))), AckOutcome::Pending);
        assert_eq!(scheme.recv_ack(QpackAck::new(SequenceNumber(1))), AckOutcome::Advanced { epoch: 2 });
        assert_eq!(scheme.recv_ack(QpackAck::new(SequenceNumber(1))), AckOutcome::Stale);

        assert_eq!(scheme.codec().epochs, vec![0, 2]);
        assert_eq!(scheme.commit_epoch(), 2);
    }

    #[test]
    fn test_flush_reaches_codec() {
        let mut scheme = scripted(&[]);
        scheme.on_packet_flushed();
        scheme.on_packet_flushed();
        assert_eq!(scheme.codec().flushes, 2);
    }

    #[test]
    #[should_panic(expected = "delivery queue not empty at teardown")]
    fn test_teardown_with_queued_blocks_is_fatal() {
        let mut scheme = scripted(&[true, true]);
        let mut stats = SimStats::new();

        let _first = scheme.encode(&request(), &mut stats).unwrap();
        let (flags, second) = scheme.encode(&request(), &mut stats).unwrap();

        // block 1 waits forever for block 0
        scheme.decode(flags, second, &mut stats).unwrap();
        assert!(scheme.queue().queued_bytes() > 0);
    }
}

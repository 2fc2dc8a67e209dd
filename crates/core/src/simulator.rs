//! Event loop that drives a compression scheme over two simulated links.
//!
//! ```text
//! requests -> encode -> [packets link] -> decode -> delivery queue
//!                ^                                          |
//!                |                                    processed blocks
//!             recv_ack <-------- [acks link] <-------- get_ack
//! ```
//!
//! # Event Order
//!
//! At each virtual instant the loop first applies due acks (so the encoder
//! encodes against the freshest commit epoch), then encodes every request
//! scheduled for that instant, then hands due packets to the decoder and
//! sends an ack for each block it finishes.
//!
//! # Packets
//!
//! Every `packet_interval` encoded blocks (and the last, possibly short, run)
//! form one packet. A packet is a single link item, so its blocks share one
//! delay and arrive together in send order. The codec may reference entries
//! inserted earlier in the same packet, so within a packet no block is
//! processed ahead of an earlier block of that packet: once one block is
//! held, the rest of the packet is enqueued without `allow_ooo`.
//!
//! The loop ends when every request has been sent and both links are empty.
//! Nothing ever blocks: "waiting" is data held in a link or queue until a
//! later event completes it.

use crate::ack::AckOutcome;
use crate::codec::Header;
use crate::error::{Error, Result};
use crate::flags::FrameFlags;
use crate::network::{LinkConfig, NetworkSimulator};
use crate::scheme::CompressionScheme;
use crate::stats::SimStats;
use crate::seqn::SequenceNumber;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, info};

/// Configuration for one simulated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Client to server link carrying header blocks
    pub request_link: LinkConfig,

    /// Server to client link carrying acks
    pub ack_link: LinkConfig,

    /// Requests encoded per flushed packet
    pub packet_interval: usize,

    /// Virtual milliseconds between consecutive requests
    pub request_spacing_ms: u64,
}

impl SimConfig {
    /// Configuration with no delay anywhere.
    pub fn perfect(seed: u64) -> Self {
        Self {
            request_link: LinkConfig::perfect(seed),
            ack_link: LinkConfig::perfect(seed.wrapping_add(1)),
            packet_interval: 1,
            request_spacing_ms: 1,
        }
    }

    /// Both links with moderate latency and jitter.
    pub fn default_with_seed(seed: u64) -> Self {
        Self {
            request_link: LinkConfig::default_with_seed(seed),
            ack_link: LinkConfig::default_with_seed(seed.wrapping_add(1)),
            packet_interval: 1,
            request_spacing_ms: 5,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.packet_interval == 0 {
            return Err(Error::Config("packet interval must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// A header block in flight with its flags.
#[derive(Debug, Clone)]
struct Frame {
    flags: FrameFlags,
    block: Bytes,
}

/// Drives one scheme through a sequence of requests.
pub struct Simulator<S: CompressionScheme> {
    scheme: S,
    config: SimConfig,
    packets: NetworkSimulator<Vec<Frame>>,
    acks: NetworkSimulator<S::Ack>,

    /// Frames encoded since the last flush
    open_packet: Vec<Frame>,

    /// Arrival time of each block the queue is holding
    held_since: HashMap<SequenceNumber, u64>,

    stats: SimStats,
    now_ms: u64,
}

impl<S: CompressionScheme> Simulator<S> {
    /// Create a simulator around `scheme`.
    ///
    /// # Errors
    /// `Error::Config` if the configuration is invalid.
    pub fn new(scheme: S, config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scheme,
            config,
            packets: NetworkSimulator::new(config.request_link),
            acks: NetworkSimulator::new(config.ack_link),
            open_packet: Vec::with_capacity(config.packet_interval),
            held_since: HashMap::new(),
            stats: SimStats::new(),
            now_ms: 0,
        })
    }

    pub fn scheme(&self) -> &S {
        &self.scheme
    }

    /// Give back the scheme. Dropping it runs the teardown check.
    pub fn into_scheme(self) -> S {
        self.scheme
    }

    /// Run every request to completion and return the accumulated statistics.
    pub fn run(&mut self, requests: &[Vec<Header>]) -> Result<SimStats> {
        info!(requests = requests.len(), "starting simulation");
        let mut next_request = 0;

        loop {
            self.deliver_acks();

            while next_request < requests.len() && self.send_time(next_request) <= self.now_ms {
                self.send_request(&requests[next_request])?;
                next_request += 1;
                if next_request % self.config.packet_interval == 0 || next_request == requests.len() {
                    self.flush_packet();
                }
            }

            self.deliver_packets()?;

            let next_send = (next_request < requests.len()).then(|| self.send_time(next_request));
            let next_event = [
                next_send,
                self.packets.next_delivery_time(),
                self.acks.next_delivery_time(),
            ]
            .into_iter()
            .flatten()
            .min();

            match next_event {
                Some(t) => self.now_ms = self.now_ms.max(t),
                None => break,
            }
        }

        self.stats.hol_blocks = self.scheme.hol_block_count();
        self.stats.sim_duration_ms = self.now_ms;

        let packets = self.packets.stats();
        self.stats.packets_sent = packets.items_sent;
        self.stats.packets_reordered = packets.items_reordered;
        self.stats.acks_reordered = self.acks.stats().items_reordered;
        info!(
            requests = self.stats.requests,
            hol_blocks = self.stats.hol_blocks,
            commit_epoch = self.stats.commit_epoch,
            "simulation finished"
        );
        Ok(self.stats.clone())
    }

    fn send_time(&self, request: usize) -> u64 {
        request as u64 * self.config.request_spacing_ms
    }

    fn send_request(&mut self, headers: &[Header]) -> Result<()> {
        let (flags, block) = self.scheme.encode(headers, &mut self.stats)?;
        self.open_packet.push(Frame { flags, block });
        Ok(())
    }

    /// Put the open packet on the link and move the codec's packet boundary.
    fn flush_packet(&mut self) {
        if self.open_packet.is_empty() {
            return;
        }
        let capacity = self.config.packet_interval;
        let packet = std::mem::replace(&mut self.open_packet, Vec::with_capacity(capacity));
        debug!(blocks = packet.len(), "flushing packet");
        self.packets.send(packet, self.now_ms);
        self.scheme.on_packet_flushed();
    }

    fn deliver_packets(&mut self) -> Result<()> {
        while let Some(packet) = self.packets.recv(self.now_ms) {
            let mut packet_held = false;

            for frame in packet {
                let flags = if packet_held {
                    FrameFlags { allow_ooo: false }
                } else {
                    frame.flags
                };

                let seqn = self.scheme.decode(flags, frame.block, &mut self.stats)?;
                let processed = self.scheme.take_processed();
                if !processed.contains(&seqn) {
                    packet_held = true;
                    self.held_since.insert(seqn, self.now_ms);
                }
                self.ack_processed(processed);
            }
        }
        Ok(())
    }

    fn ack_processed(&mut self, processed: Vec<SequenceNumber>) {
        for seqn in processed {
            if let Some(since) = self.held_since.remove(&seqn) {
                let delay = self.now_ms - since;
                self.stats.hol_delay_ms += delay;
                self.stats.max_hol_delay_ms = self.stats.max_hol_delay_ms.max(delay);
            }
            let ack = self.scheme.get_ack(seqn);
            self.acks.send(ack, self.now_ms);
            self.stats.acks_sent += 1;
        }
    }

    fn deliver_acks(&mut self) {
        while let Some(ack) = self.acks.recv(self.now_ms) {
            match self.scheme.recv_ack(ack) {
                AckOutcome::Advanced { epoch } => self.stats.commit_epoch = epoch,
                AckOutcome::Stale | AckOutcome::Duplicate => self.stats.acks_stale += 1,
                AckOutcome::Pending => {}
            }
        }
    }
}

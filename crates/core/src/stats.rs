//! Statistics collected during a simulated exchange.
//!
//! The scheme writes compression and queueing figures, the simulator adds
//! ack and timing figures. Nothing in the protocol core reads them back.
//!
//! # Thread Safety
//!
//! `SimStats` is a plain struct updated from the single simulation loop.

/// Accumulated statistics for one simulated connection.
#[derive(Debug, Clone, PartialEq)]
pub struct SimStats {
    // === Encoding ===
    /// Header blocks encoded
    pub requests: u64,

    /// Header bytes before compression (HTTP/1 line form)
    pub uncompressed: u64,

    /// Codec payload bytes, excluding the sequence-number prefix
    pub compressed: u64,

    /// Blocks flagged safe for out-of-order processing
    pub ooo_allowed: u64,

    /// Blocks whose encode evicted table entries
    pub evictions: u64,

    // === Decoding ===
    /// Peak bytes held by the delivery queue
    pub max_queue_buffer_bytes: usize,

    /// Blocks that waited behind an earlier block
    pub hol_blocks: u32,

    /// Virtual milliseconds all held blocks spent waiting, summed
    pub hol_delay_ms: u64,

    /// Longest single head-of-line wait in virtual milliseconds
    pub max_hol_delay_ms: u64,

    // === Acks ===
    /// Acks sent by the decoder
    pub acks_sent: u64,

    /// Acks that arrived at or behind the commit epoch
    pub acks_stale: u64,

    /// Final commit epoch
    pub commit_epoch: i64,

    // === Links ===
    /// Packets put on the request link
    pub packets_sent: u64,

    /// Packets delivered after a packet sent later than them
    pub packets_reordered: u64,

    /// Acks delivered after an ack sent later than them
    pub acks_reordered: u64,

    // === Timing ===
    /// Virtual time at which the last item was delivered
    pub sim_duration_ms: u64,
}

impl SimStats {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self {
            requests: 0,
            uncompressed: 0,
            compressed: 0,
            ooo_allowed: 0,
            evictions: 0,
            max_queue_buffer_bytes: 0,
            hol_blocks: 0,
            hol_delay_ms: 0,
            max_hol_delay_ms: 0,
            acks_sent: 0,
            acks_stale: 0,
            commit_epoch: -1,
            packets_sent: 0,
            packets_reordered: 0,
            acks_reordered: 0,
            sim_duration_ms: 0,
        }
    }

    /// Compute compression ratio (compressed / uncompressed).
    ///
    /// Returns 0.0 if nothing was encoded.
    pub fn compression_ratio(&self) -> f64 {
        if self.uncompressed == 0 {
            0.0
        } else {
            self.compressed as f64 / self.uncompressed as f64
        }
    }

    /// Fraction of blocks that waited behind an earlier block.
    pub fn hol_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            f64::from(self.hol_blocks) / self.requests as f64
        }
    }

    /// Mean wait of a head-of-line blocked block, in virtual milliseconds.
    pub fn mean_hol_delay_ms(&self) -> f64 {
        if self.hol_blocks == 0 {
            0.0
        } else {
            self.hol_delay_ms as f64 / f64::from(self.hol_blocks)
        }
    }

    /// Fraction of packets that arrived behind a later packet.
    pub fn packet_reorder_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.packets_reordered as f64 / self.packets_sent as f64
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Simulation Summary ===");
        println!("Virtual duration: {} ms", self.sim_duration_ms);
        println!();

        println!("=== Compression ===");
        println!("Requests: {}", self.requests);
        println!("Uncompressed: {} bytes", self.uncompressed);
        println!("Compressed: {} bytes", self.compressed);
        println!("Ratio: {:.1}%", self.compression_ratio() * 100.0);
        println!("Evicting encodes: {}", self.evictions);
        println!("Out-of-order allowed: {}", self.ooo_allowed);
        println!();

        println!("=== Ordering ===");
        println!("HOL blocks: {} ({:.2}%)", self.hol_blocks, self.hol_rate() * 100.0);
        println!(
            "HOL delay: {:.1} ms mean, {} ms max",
            self.mean_hol_delay_ms(),
            self.max_hol_delay_ms
        );
        println!("Max queued: {} bytes", self.max_queue_buffer_bytes);
        println!();

        println!("=== Links ===");
        println!("Packets sent: {}", self.packets_sent);
        println!(
            "Packets reordered: {} ({:.2}%)",
            self.packets_reordered,
            self.packet_reorder_rate() * 100.0
        );
        println!("Acks reordered: {}", self.acks_reordered);
        println!();

        println!("=== Acks ===");
        println!("Acks sent: {}", self.acks_sent);
        println!("Stale acks: {}", self.acks_stale);
        println!("Commit epoch: {}", self.commit_epoch);
        println!();
    }

    /// Export statistics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "requests={}\n\
             uncompressed={}\n\
             compressed={}\n\
             compression_ratio={:.4}\n\
             evictions={}\n\
             ooo_allowed={}\n\
             hol_blocks={}\n\
             hol_delay_ms={}\n\
             max_hol_delay_ms={}\n\
             max_queue_buffer_bytes={}\n\
             acks_sent={}\n\
             acks_stale={}\n\
             commit_epoch={}\n\
             packets_sent={}\n\
             packets_reordered={}\n\
             acks_reordered={}\n\
             sim_duration_ms={}\n",
            self.requests,
            self.uncompressed,
            self.compressed,
            self.compression_ratio(),
            self.evictions,
            self.ooo_allowed,
            self.hol_blocks,
            self.hol_delay_ms,
            self.max_hol_delay_ms,
            self.max_queue_buffer_bytes,
            self.acks_sent,
            self.acks_stale,
            self.commit_epoch,
            self.packets_sent,
            self.packets_reordered,
            self.acks_reordered,
            self.sim_duration_ms,
        )
    }
}

impl Default for SimStats {
    fn default() -> Self {
        Self::new()
    }
}

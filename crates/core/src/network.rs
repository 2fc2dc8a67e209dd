//! Network link simulator with latency and jitter on a virtual clock.
//!
//! Each direction of a simulated connection gets its own link. Items sent
//! close together may be delivered out of order when jitter exceeds their
//! spacing, which is exactly the reordering the ack and delivery protocol has
//! to cope with.
//!
//! # Simulated Effects
//!
//! - **Latency**: Base delay for all items
//! - **Jitter**: Random variation in latency (uniform ±jitter)
//!
//! There is no loss: nothing in the protocol retransmits, so a lost block
//! would simply stall the decoder forever.
//!
//! # Implementation
//!
//! Uses a priority queue (min-heap) keyed by delivery time, ties broken by
//! send order. Time is a virtual millisecond counter supplied by the caller,
//! so runs never sleep.
//!
//! # Determinism
//!
//! All randomness comes from a seeded ChaCha8 RNG. Given the same seed
//! and inputs, outputs are bit-identical.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Configuration for one simulated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Base latency in milliseconds
    pub base_latency_ms: u64,

    /// Jitter range in milliseconds (uniform ±jitter)
    pub jitter_ms: u64,

    /// Random seed for determinism
    pub seed: u64,
}

impl LinkConfig {
    /// Create a configuration with no delay and no reordering.
    pub fn perfect(seed: u64) -> Self {
        Self {
            base_latency_ms: 0,
            jitter_ms: 0,
            seed,
        }
    }

    /// Create a default configuration with moderate reordering.
    pub fn default_with_seed(seed: u64) -> Self {
        Self {
            base_latency_ms: 50,
            jitter_ms: 20,
            seed,
        }
    }
}

/// An item with scheduled delivery time.
#[derive(Debug, Clone)]
struct Scheduled<T> {
    item: T,
    delivery_time: u64,
    order: u64,
}

// Implement ordering for the heap (min-heap: earliest delivery first)
impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.delivery_time == other.delivery_time && self.order == other.order
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earlier time = higher priority)
        other
            .delivery_time
            .cmp(&self.delivery_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// One direction of a simulated connection.
///
/// # Thread Safety
/// Not thread-safe; use one instance per thread or synchronize externally.
pub struct NetworkSimulator<T> {
    config: LinkConfig,
    rng: ChaCha8Rng,
    queue: BinaryHeap<Scheduled<T>>,

    // Statistics
    items_sent: u64,
    items_delivered: u64,
    items_reordered: u64,
    last_delivered_order: Option<u64>,
}

impl<T> NetworkSimulator<T> {
    /// Create a new link with the given configuration.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            queue: BinaryHeap::new(),
            items_sent: 0,
            items_delivered: 0,
            items_reordered: 0,
            last_delivered_order: None,
        }
    }

    /// Send an item at virtual time `now_ms`.
    pub fn send(&mut self, item: T, now_ms: u64) {
        let delivery_time = now_ms + self.compute_delay();
        self.queue.push(Scheduled {
            item,
            delivery_time,
            order: self.items_sent,
        });
        self.items_sent += 1;
    }

    /// Receive the next item due at or before `now_ms`.
    ///
    /// Non-blocking: returns `None` if nothing is due yet.
    pub fn recv(&mut self, now_ms: u64) -> Option<T> {
        let due = self.queue.peek()?.delivery_time <= now_ms;
        if !due {
            return None;
        }
        let scheduled = self.queue.pop()?;
        self.record_delivery(scheduled.order);
        Some(scheduled.item)
    }

    /// Delivery time of the earliest item in flight.
    pub fn next_delivery_time(&self) -> Option<u64> {
        self.queue.peek().map(|s| s.delivery_time)
    }

    /// Drain all remaining items in delivery order, ignoring delivery times.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.queue.len());
        while let Some(scheduled) = self.queue.pop() {
            self.record_delivery(scheduled.order);
            items.push(scheduled.item);
        }
        items
    }

    /// Get statistics about link behavior.
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            items_sent: self.items_sent,
            items_delivered: self.items_delivered,
            items_reordered: self.items_reordered,
        }
    }

    fn record_delivery(&mut self, order: u64) {
        self.items_delivered += 1;
        match self.last_delivered_order {
            Some(last) if order < last => self.items_reordered += 1,
            _ => self.last_delivered_order = Some(order),
        }
    }

    /// Compute delay for an item in milliseconds.
    ///
    /// Delay = base_latency ± jitter
    fn compute_delay(&mut self) -> u64 {
        let base = self.config.base_latency_ms;

        if self.config.jitter_ms == 0 {
            return base;
        }

        // Uniform jitter: base ± jitter_ms
        let jitter_range = self.config.jitter_ms * 2;
        let jitter = self.rng.gen_range(0..=jitter_range);
        let jitter_offset = jitter as i64 - self.config.jitter_ms as i64;

        (base as i64 + jitter_offset).max(0) as u64
    }
}

/// Statistics about link behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStats {
    /// Total items sent into the link
    pub items_sent: u64,

    /// Items delivered
    pub items_delivered: u64,

    /// Items delivered after an item sent later than them
    pub items_reordered: u64,
}

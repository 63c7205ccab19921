//! Metrics collection for the ndnfw forwarder.
//!
//! Lock-free meters the forwarding plane updates on every dispatch
//! outcome. Readers observe racing updates; the values are statistics,
//! not synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Counter
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

/// A histogram over fixed upper-bound buckets, with a catch-all overflow
/// bucket past the last boundary.
#[derive(Debug)]
pub struct Histogram {
    bounds: Vec<u64>,
    buckets: Vec<AtomicU64>,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bounds: Vec<u64>) -> Self {
        let buckets = (0..bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            buckets,
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Exponentially spaced boundaries from `min` to `max`.
    pub fn exponential(min: u64, max: u64, buckets: usize) -> Self {
        assert!(min > 0 && min < max && buckets > 1);
        let factor = (max as f64 / min as f64).powf(1.0 / (buckets as f64 - 1.0));
        let mut bounds = Vec::with_capacity(buckets);
        let mut value = min as f64;
        for _ in 0..buckets {
            bounds.push(value.round() as u64);
            value *= factor;
        }
        Self::new(bounds)
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        match self.bounds.iter().position(|&b| value <= b) {
            Some(idx) => self.buckets[idx].fetch_add(1, Ordering::Relaxed),
            None => self.overflow.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Per-bucket (upper bound, count) pairs, excluding overflow.
    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        self.bounds
            .iter()
            .zip(self.buckets.iter())
            .map(|(&b, bucket)| (b, bucket.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for the forwarder
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct ForwarderMetrics {
    // Interest path
    pub interests_received: Counter,
    pub interests_forwarded: Counter,
    pub interests_aggregated: Counter,
    pub interests_looped: Counter,
    pub interests_no_route: Counter,

    // Data path
    pub data_received: Counter,
    pub data_sent: Counter,
    pub data_unsolicited: Counter,

    // Nack / cancel path
    pub nacks_received: Counter,
    pub nacks_sent: Counter,
    pub cancels_received: Counter,

    // Table state
    pub pit_inserts: Counter,
    pub pit_expirations: Counter,
    pub pit_size: Gauge,
    pub fib_size: Gauge,

    /// Time from PIT entry creation to satisfying Data, in microseconds.
    pub satisfy_latency_us: Histogram,
}

impl ForwarderMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for ForwarderMetrics {
    fn default() -> Self {
        Self {
            interests_received: Counter::new(),
            interests_forwarded: Counter::new(),
            interests_aggregated: Counter::new(),
            interests_looped: Counter::new(),
            interests_no_route: Counter::new(),
            data_received: Counter::new(),
            data_sent: Counter::new(),
            data_unsolicited: Counter::new(),
            nacks_received: Counter::new(),
            nacks_sent: Counter::new(),
            cancels_received: Counter::new(),
            pit_inserts: Counter::new(),
            pit_expirations: Counter::new(),
            pit_size: Gauge::new(),
            fib_size: Gauge::new(),
            satisfy_latency_us: Histogram::exponential(10, 10_000_000, 7),
        }
    }
}

//! Lock-free performance counters for the logging engine (component C1).
//!
//! Grounded in the teacher's `LoggerMetrics` (`config/state.rs`), which
//! counted `total_logs`/`bytes_written`/`errors_count`/`dropped_logs` as
//! plain fields updated under the state lock. This engine's dispatcher
//! runs lock-free on the hot path, so every counter here is a bare atomic
//! instead — no lock is taken to record a metric.

use std::sync::atomic::{AtomicU64, Ordering};

const LEVELS: usize = 5;

/// Histogram bucket upper bounds for write latency, in microseconds.
/// Grounded in the other-pack `ultra-logger::config::MetricsConfig`
/// latency bucket list, adapted from seconds to microseconds to match
/// this crate's write-latency granularity.
pub const LATENCY_BUCKETS_US: [u64; 7] = [1, 10, 100, 1_000, 10_000, 100_000, 1_000_000];

/// Atomic counters shared across every producer thread and the
/// dispatcher. Cloning a [`Metrics`] handle shares the same counters (it
/// holds only `Arc`-free atomics behind a reference, constructed once per
/// logger and handed out by reference).
#[derive(Debug, Default)]
pub struct Metrics {
    messages_logged_by_level: [AtomicU64; LEVELS],
    messages_dropped_queue_full: AtomicU64,
    messages_dropped_sampled: AtomicU64,
    messages_dropped_filtered: AtomicU64,
    messages_dropped_format_error: AtomicU64,
    bytes_written: AtomicU64,
    rotations_total: AtomicU64,
    compressions_total: AtomicU64,
    compression_errors_total: AtomicU64,
    write_errors_total: AtomicU64,
    latency_buckets: [AtomicU64; LATENCY_BUCKETS_US.len() + 1],
}

/// Point-in-time, plain-data copy of [`Metrics`], suitable for handing to
/// a collaborator-owned exporter (Prometheus text formatting is out of
/// scope for this crate, per spec §1).
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub messages_logged_by_level: [u64; LEVELS],
    pub messages_dropped_queue_full: u64,
    pub messages_dropped_sampled: u64,
    pub messages_dropped_filtered: u64,
    pub messages_dropped_format_error: u64,
    pub bytes_written: u64,
    pub rotations_total: u64,
    pub compressions_total: u64,
    pub compression_errors_total: u64,
    pub write_errors_total: u64,
    pub latency_histogram_us: Vec<(u64, u64)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_logged(&self, level: crate::level::Level) {
        self.messages_logged_by_level[level.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_full_drop(&self) {
        self.messages_dropped_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sampled_drop(&self) {
        self.messages_dropped_sampled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered_drop(&self) {
        self.messages_dropped_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_format_error_drop(&self) {
        self.messages_dropped_format_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_written(&self, n: u64) {
        self.bytes_written.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_rotation(&self) {
        self.rotations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compression(&self) {
        self.compressions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compression_error(&self) {
        self.compression_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.write_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_latency_us(&self, micros: u64) {
        let bucket = LATENCY_BUCKETS_US
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(LATENCY_BUCKETS_US.len());
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Total drops of any kind — used to verify the invariant
    /// `n == observed + drops` from spec §8.
    pub fn total_dropped(&self) -> u64 {
        self.messages_dropped_queue_full.load(Ordering::Relaxed)
            + self.messages_dropped_sampled.load(Ordering::Relaxed)
            + self.messages_dropped_filtered.load(Ordering::Relaxed)
            + self.messages_dropped_format_error.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut by_level = [0u64; LEVELS];
        for (i, counter) in self.messages_logged_by_level.iter().enumerate() {
            by_level[i] = counter.load(Ordering::Relaxed);
        }
        let mut latency_histogram_us = Vec::with_capacity(LATENCY_BUCKETS_US.len() + 1);
        for (i, bound) in LATENCY_BUCKETS_US.iter().enumerate() {
            latency_histogram_us.push((*bound, self.latency_buckets[i].load(Ordering::Relaxed)));
        }
        latency_histogram_us.push((
            u64::MAX,
            self.latency_buckets[LATENCY_BUCKETS_US.len()].load(Ordering::Relaxed),
        ));
        MetricsSnapshot {
            messages_logged_by_level: by_level,
            messages_dropped_queue_full: self.messages_dropped_queue_full.load(Ordering::Relaxed),
            messages_dropped_sampled: self.messages_dropped_sampled.load(Ordering::Relaxed),
            messages_dropped_filtered: self.messages_dropped_filtered.load(Ordering::Relaxed),
            messages_dropped_format_error: self
                .messages_dropped_format_error
                .load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            rotations_total: self.rotations_total.load(Ordering::Relaxed),
            compressions_total: self.compressions_total.load(Ordering::Relaxed),
            compression_errors_total: self.compression_errors_total.load(Ordering::Relaxed),
            write_errors_total: self.write_errors_total.load(Ordering::Relaxed),
            latency_histogram_us,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    #[test]
    fn drop_counters_sum_into_total_dropped() {
        let m = Metrics::new();
        m.record_queue_full_drop();
        m.record_sampled_drop();
        m.record_filtered_drop();
        assert_eq!(m.total_dropped(), 3);
    }

    #[test]
    fn logged_counts_split_by_level() {
        let m = Metrics::new();
        m.record_logged(Level::Info);
        m.record_logged(Level::Info);
        m.record_logged(Level::Error);
        let snap = m.snapshot();
        assert_eq!(snap.messages_logged_by_level[Level::Info.index()], 2);
        assert_eq!(snap.messages_logged_by_level[Level::Error.index()], 1);
    }

    #[test]
    fn latency_bucket_assignment() {
        let m = Metrics::new();
        m.record_write_latency_us(5);
        m.record_write_latency_us(50_000_000);
        let snap = m.snapshot();
        assert_eq!(snap.latency_histogram_us[0], (1, 0));
        assert_eq!(snap.latency_histogram_us[1].1, 1); // falls in <=10us bucket
        assert_eq!(snap.latency_histogram_us.last().unwrap().1, 1); // overflow bucket
    }
}

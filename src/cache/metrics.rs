//! Cache Metrics Module
//!
//! Counts hits, misses, evictions and expirations, and derives hit rate and
//! memory utilization. Counters are atomics so a snapshot never needs the
//! store lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

// == Cache Metrics ==
/// Point-in-time snapshot of cache effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    /// Number of `get` calls
    pub total_queries: u64,
    /// Number of `get` calls that returned data
    pub cache_hits: u64,
    /// Number of `get` calls that found nothing or an expired entry
    pub cache_misses: u64,
    /// `cache_hits / total_queries * 100`, or 0 with no queries
    pub hit_rate: f64,
    /// Published size as a percentage of capacity
    pub memory_usage_percent: f64,
    /// Published size in bytes
    pub memory_usage_bytes: usize,
    /// Entries removed by reclamation
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Published entry count
    pub entry_count: usize,
}

// == Metrics Recorder ==
/// Lock-free counters shared between the store and metric readers.
#[derive(Debug)]
pub struct MetricsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    size_bytes: AtomicUsize,
    entry_count: AtomicUsize,
    capacity_bytes: usize,
}

impl MetricsRecorder {
    // == Constructor ==
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            size_bytes: AtomicUsize::new(0),
            entry_count: AtomicUsize::new(0),
            capacity_bytes,
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    // == Publish Usage ==
    /// Publishes the current store size for `memory_usage_percent`.
    pub fn publish_usage(&self, size_bytes: usize, entry_count: usize) {
        self.size_bytes.store(size_bytes, Ordering::Relaxed);
        self.entry_count.store(entry_count, Ordering::Relaxed);
    }

    // == Reset ==
    /// Zeroes every counter.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.publish_usage(0, 0);
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> CacheMetrics {
        let cache_hits = self.hits.load(Ordering::Relaxed);
        let cache_misses = self.misses.load(Ordering::Relaxed);
        let total_queries = cache_hits + cache_misses;
        let memory_usage_bytes = self.size_bytes.load(Ordering::Relaxed);

        CacheMetrics {
            total_queries,
            cache_hits,
            cache_misses,
            hit_rate: percent(cache_hits as f64, total_queries as f64),
            memory_usage_percent: percent(memory_usage_bytes as f64, self.capacity_bytes as f64),
            memory_usage_bytes,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entry_count: self.entry_count.load(Ordering::Relaxed),
        }
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

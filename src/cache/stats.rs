//! Cache Statistics Module
//!
//! Tracks cache activity counters and assembles read-only snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

const MIB: f64 = 1024.0 * 1024.0;

// == Cache Counters ==
/// Lock-free activity counters shared by the store, the eviction policy
/// and the fetch coordinator.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    fetches: AtomicU64,
    passthroughs: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// An entry removed because it outlived the TTL.
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// An entry removed to bring the cache back under its size budget.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// A completed remote transfer stored in the cache.
    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// A request served straight from the remote locator without storage.
    pub fn record_passthrough(&self) {
        self.passthroughs.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values into `stats`.
    pub fn fill(&self, stats: &mut CacheStats) {
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.expirations = self.expirations.load(Ordering::Relaxed);
        stats.evictions = self.evictions.load(Ordering::Relaxed);
        stats.fetches = self.fetches.load(Ordering::Relaxed);
        stats.passthroughs = self.passthroughs.load(Ordering::Relaxed);
    }
}

// == Cache Stats ==
/// Read-only snapshot of cache occupancy and activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Live entries currently stored
    pub entry_count: usize,
    /// Sum of sizes over entries with a known size
    pub total_size_bytes: u64,
    /// Entries whose size the backend could not report
    pub unknown_size_entries: usize,
    /// Configured size budget
    pub max_size_bytes: u64,
    /// Where the backend keeps its data
    pub backing_location: String,
    /// True when running in pass-through mode
    pub degraded: bool,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub fetches: u64,
    pub passthroughs: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Occupied size in MiB, rounded to two decimals.
    pub fn total_size_mb(&self) -> f64 {
        (self.total_size_bytes as f64 / MIB * 100.0).round() / 100.0
    }

    /// Size budget in MiB, rounded to two decimals.
    pub fn max_size_mb(&self) -> f64 {
        (self.max_size_bytes as f64 / MIB * 100.0).round() / 100.0
    }
}

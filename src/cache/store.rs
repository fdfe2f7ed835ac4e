//! Cache Store Module
//!
//! Owns the cached artifacts: existence checks with TTL enforcement,
//! all-or-nothing insertion, removal and full clears over a storage backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::backend::{ArtifactSource, StorageBackend};
use crate::cache::{CacheCounters, CacheEntry, CacheKey, CacheStats, KeyLocks};
use crate::error::Result;

// == Lookup ==
/// Outcome of a store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(CacheEntry),
    Miss,
}

impl Lookup {
    pub fn entry(self) -> Option<CacheEntry> {
        match self {
            Lookup::Found(entry) => Some(entry),
            Lookup::Miss => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

// == Cache Store ==
/// Artifact storage with per-key mutual exclusion and TTL enforcement.
///
/// Lookups, inserts and removals on the same key run one at a time; different
/// keys proceed concurrently. `clear` excludes everything else while it runs.
#[derive(Debug)]
pub struct CacheStore {
    /// Physical storage
    backend: Arc<dyn StorageBackend>,
    /// Per-key exclusion
    locks: KeyLocks,
    /// Shared by keyed operations, taken exclusively by clear
    clear_gate: RwLock<()>,
    /// Activity counters
    counters: CacheCounters,
    /// Entries older than this are logically absent
    max_age: Duration,
    /// Size budget reported in stats
    max_size_bytes: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store over `backend`.
    ///
    /// # Arguments
    /// * `backend` - Storage backend chosen by the host environment
    /// * `max_age` - TTL applied on lookup
    /// * `max_size_bytes` - Size budget, reported in stats
    pub fn new(backend: Arc<dyn StorageBackend>, max_age: Duration, max_size_bytes: u64) -> Self {
        Self {
            backend,
            locks: KeyLocks::new(),
            clear_gate: RwLock::new(()),
            counters: CacheCounters::new(),
            max_age,
            max_size_bytes,
        }
    }

    // == Initialize ==
    /// Idempotently prepares the backing area.
    ///
    /// Fails with `StorageUnavailable` when the backend cannot be prepared;
    /// callers should fall back to pass-through mode.
    pub async fn initialize(&self) -> Result<()> {
        self.backend.prepare().await?;
        info!(location = %self.backend.descriptor(), "Cache store initialized");
        Ok(())
    }

    // == Lookup ==
    /// Resolves whether a live entry exists for `key`.
    ///
    /// An expired entry is deleted before `Miss` is reported. Backend errors
    /// are logged and reported as `Miss`.
    pub async fn lookup(&self, key: &CacheKey) -> Lookup {
        let result = self.lookup_uncounted(key).await;
        match &result {
            Lookup::Found(_) => {
                self.counters.record_hit();
                debug!(key = %key, "Cache hit");
            }
            Lookup::Miss => {
                self.counters.record_miss();
                debug!(key = %key, "Cache miss");
            }
        }
        result
    }

    /// Same as [`lookup`](Self::lookup) without touching the hit/miss counters.
    pub(crate) async fn lookup_uncounted(&self, key: &CacheKey) -> Lookup {
        let _gate = self.clear_gate.read().await;
        let _guard = self.locks.acquire(key.stem()).await;

        let entry = match self.backend.stat(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Lookup::Miss,
            Err(err) => {
                warn!(key = %key, error = %err, "Cache lookup failed");
                return Lookup::Miss;
            }
        };

        if entry.is_expired(self.max_age, Utc::now()) {
            info!(key = %key, "Cached artifact expired, removing");
            match self.backend.delete(key).await {
                Ok(_) => self.counters.record_expiration(),
                Err(err) => warn!(key = %key, error = %err, "Failed to remove expired artifact"),
            }
            return Lookup::Miss;
        }

        Lookup::Found(entry)
    }

    // == Insert ==
    /// Materializes `source` under `key`, replacing any prior entry.
    ///
    /// Insertion is all-or-nothing: on failure the prior entry, if any,
    /// remains untouched.
    pub async fn insert(&self, key: &CacheKey, source: ArtifactSource) -> Result<CacheEntry> {
        let _gate = self.clear_gate.read().await;
        let _guard = self.locks.acquire(key.stem()).await;

        let entry = self.backend.write(key, source).await?;
        info!(
            key = %key,
            size_bytes = ?entry.size_bytes,
            location = %entry.location.describe(),
            "Artifact cached"
        );
        Ok(entry)
    }

    // == Remove ==
    /// Deletes the entry under `key` if present.
    ///
    /// Never fails: backend errors are logged. Returns true if something
    /// was removed.
    pub async fn remove(&self, key: &CacheKey) -> bool {
        let _gate = self.clear_gate.read().await;
        let _guard = self.locks.acquire(key.stem()).await;

        match self.backend.delete(key).await {
            Ok(removed) => {
                if removed {
                    info!(key = %key, "Artifact removed");
                }
                removed
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to remove artifact");
                false
            }
        }
    }

    // == Evict Entry ==
    /// Removes `planned` only if the stored entry under its key is still the
    /// same write. A re-insert since planning is left alone.
    pub(crate) async fn evict_entry(&self, planned: &CacheEntry) -> bool {
        let _gate = self.clear_gate.read().await;
        let _guard = self.locks.acquire(planned.key.stem()).await;

        match self.backend.stat(&planned.key).await {
            Ok(Some(current)) if current.written_at == planned.written_at => {}
            Ok(_) => return false,
            Err(err) => {
                warn!(key = %planned.key, error = %err, "Failed to stat eviction candidate");
                return false;
            }
        }

        match self.backend.delete(&planned.key).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(key = %planned.key, error = %err, "Failed to evict artifact");
                false
            }
        }
    }

    // == Clear ==
    /// Removes every entry and prepares the backing area again.
    ///
    /// The store is usable as soon as this returns.
    pub async fn clear(&self) -> Result<()> {
        let _gate = self.clear_gate.write().await;
        self.backend.wipe().await?;
        info!(location = %self.backend.descriptor(), "Cache cleared");
        Ok(())
    }

    // == Entries ==
    /// Lists stored entries, including expired ones not yet removed.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        let _gate = self.clear_gate.read().await;
        self.backend.list().await
    }

    // == Stats ==
    /// Returns a snapshot of occupancy and activity.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.activity_stats();

        match self.entries().await {
            Ok(entries) => {
                stats.entry_count = entries.len();
                for entry in &entries {
                    match entry.size_bytes {
                        Some(size) => stats.total_size_bytes += size,
                        None => stats.unknown_size_entries += 1,
                    }
                }
            }
            Err(err) => warn!(error = %err, "Failed to read cache occupancy"),
        }

        stats
    }

    /// Activity counters only, without reading the backend.
    pub fn activity_stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            max_size_bytes: self.max_size_bytes,
            backing_location: self.backend.descriptor(),
            ..CacheStats::default()
        };
        self.counters.fill(&mut stats);
        stats
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn retains_bytes(&self) -> bool {
        self.backend.retains_bytes()
    }

    pub fn backing_location(&self) -> String {
        self.backend.descriptor()
    }
}

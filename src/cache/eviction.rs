//! Eviction Policy Module
//!
//! TTL expiry plus size-bounded, oldest-first eviction with a hysteresis band.
//!
//! Planning is a pure function over a listing of entries; running a plan
//! goes through the store so every removal respects per-key exclusion.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheKey, CacheStore};
use crate::error::Result;

// == Eviction Config ==
/// Limits enforced by the eviction policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvictionConfig {
    /// Size budget over entries with known size
    pub max_size_bytes: u64,
    /// Entries older than this are removed unconditionally
    pub max_age: Duration,
    /// Fraction of the budget to shrink to once it is exceeded
    pub target_fill_ratio: f64,
}

impl EvictionConfig {
    /// Size the cache is shrunk to once `max_size_bytes` is exceeded.
    pub fn target_size_bytes(&self) -> u64 {
        (self.max_size_bytes as f64 * self.target_fill_ratio).floor() as u64
    }
}

// == Eviction Plan ==
/// Entries selected for removal by one planning pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvictionPlan {
    /// Entries past their TTL, oldest first
    pub expired: Vec<CacheEntry>,
    /// Live entries removed for size, oldest first
    pub oversize: Vec<CacheEntry>,
    /// Known-size total once the plan is applied
    pub remaining_size_bytes: u64,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.oversize.is_empty()
    }
}

/// Orders by write time, then key, so equal timestamps resolve the same way
/// on every run.
fn oldest_first(a: &CacheEntry, b: &CacheEntry) -> std::cmp::Ordering {
    a.written_at
        .cmp(&b.written_at)
        .then_with(|| a.key.cmp(&b.key))
}

// == Plan ==
/// Selects entries to remove.
///
/// Expired entries always go. If the known-size total of the remaining
/// entries exceeds `max_size_bytes`, live entries with known size are taken
/// oldest first until the total is at or below the target size. Entries in
/// `protected` are never selected, even when they alone exceed the budget.
/// Entries of unknown size count toward neither total and are only ever
/// removed by TTL.
pub fn plan(
    mut entries: Vec<CacheEntry>,
    config: &EvictionConfig,
    now: DateTime<Utc>,
    protected: &HashSet<CacheKey>,
) -> EvictionPlan {
    entries.sort_by(oldest_first);

    let mut plan = EvictionPlan::default();
    let mut live = Vec::with_capacity(entries.len());

    for entry in entries {
        if protected.contains(&entry.key) {
            live.push(entry);
        } else if entry.is_expired(config.max_age, now) {
            plan.expired.push(entry);
        } else {
            live.push(entry);
        }
    }

    let mut total: u64 = live.iter().filter_map(|e| e.size_bytes).sum();

    if total > config.max_size_bytes {
        let target = config.target_size_bytes();
        for entry in live {
            if total <= target {
                break;
            }
            if protected.contains(&entry.key) {
                continue;
            }
            let Some(size) = entry.size_bytes else {
                continue;
            };
            total = total.saturating_sub(size);
            plan.oversize.push(entry);
        }
    }

    plan.remaining_size_bytes = total;
    plan
}

// == Eviction Report ==
/// Outcome of running the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Entries removed for exceeding the TTL
    pub expired: usize,
    /// Entries removed for size
    pub evicted: usize,
    /// Bytes reclaimed by size eviction and expiry
    pub freed_bytes: u64,
    /// Known-size total after the last pass
    pub remaining_size_bytes: u64,
    /// Planning passes performed by this call
    pub passes: usize,
    /// True when the trigger was handed to a pass already in progress
    pub coalesced: bool,
}

// == Eviction Policy ==
/// Runs eviction against a store, never more than one pass at a time.
///
/// A trigger that arrives while a pass is running is queued; the running
/// call performs another pass before returning, protecting every key queued
/// in the meantime.
#[derive(Debug)]
pub struct EvictionPolicy {
    config: EvictionConfig,
    running: AsyncMutex<()>,
    queued: Mutex<Option<HashSet<CacheKey>>>,
}

impl EvictionPolicy {
    pub fn new(config: EvictionConfig) -> Self {
        Self {
            config,
            running: AsyncMutex::new(()),
            queued: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EvictionConfig {
        &self.config
    }

    fn enqueue(&self, protect: Option<&CacheKey>) {
        let mut queued = self.queued.lock().unwrap_or_else(PoisonError::into_inner);
        let protected = queued.get_or_insert_with(HashSet::new);
        if let Some(key) = protect {
            protected.insert(key.clone());
        }
    }

    fn take_queued(&self) -> Option<HashSet<CacheKey>> {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn has_queued(&self) -> bool {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // == Run ==
    /// Triggers eviction, protecting `protect` (the entry just inserted).
    ///
    /// Returns immediately with `coalesced` set if another call is already
    /// running; that call picks up this trigger.
    pub async fn run(&self, store: &CacheStore, protect: Option<&CacheKey>) -> Result<EvictionReport> {
        self.enqueue(protect);
        let mut report = EvictionReport::default();

        loop {
            let Ok(running_guard) = self.running.try_lock() else {
                report.coalesced = true;
                debug!("Eviction already running, trigger coalesced");
                return Ok(report);
            };

            while let Some(protected) = self.take_queued() {
                self.pass(store, &protected, &mut report).await?;
            }

            drop(running_guard);

            // A trigger may have been queued between the last take and the
            // unlock; its caller saw the lock held and left it to us.
            if !self.has_queued() {
                return Ok(report);
            }
        }
    }

    async fn pass(
        &self,
        store: &CacheStore,
        protected: &HashSet<CacheKey>,
        report: &mut EvictionReport,
    ) -> Result<()> {
        let entries = store.entries().await?;
        let plan = plan(entries, &self.config, Utc::now(), protected);
        report.passes += 1;
        report.remaining_size_bytes = plan.remaining_size_bytes;

        if plan.is_empty() {
            return Ok(());
        }

        for entry in &plan.expired {
            if store.evict_entry(entry).await {
                store.counters().record_expiration();
                report.expired += 1;
                report.freed_bytes += entry.size_bytes.unwrap_or(0);
                info!(key = %entry.key, "Expired artifact removed");
            }
        }

        for entry in &plan.oversize {
            if store.evict_entry(entry).await {
                store.counters().record_eviction();
                report.evicted += 1;
                report.freed_bytes += entry.size_bytes.unwrap_or(0);
                info!(key = %entry.key, size_bytes = ?entry.size_bytes, "Artifact evicted for size");
            }
        }

        info!(
            expired = report.expired,
            evicted = report.evicted,
            remaining_size_bytes = plan.remaining_size_bytes,
            "Eviction pass complete"
        );
        Ok(())
    }
}

//! Fetch Coordinator
//!
//! Turns a remote identifier plus locator into a usable artifact handle:
//! served from the store when a live entry exists, otherwise transferred,
//! stored and followed by an eviction pass.
//!
//! When the backing storage cannot be prepared the coordinator runs in
//! degraded mode and hands the remote locator straight back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    ArtifactLocation, ArtifactSource, CacheEntry, CacheKey, CacheStats, CacheStore,
    EvictionPolicy, EvictionReport, KeyLocks, Lookup, DEFAULT_EXTENSION,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fetch::remote::{validate_source, HttpFetcher, RemoteFetcher};
use crate::tasks::spawn_maintenance_task;

// == Fetch Options ==
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Suffix appended to every artifact name
    pub artifact_extension: String,
    /// Check reachability before committing to a transfer
    pub probe_before_fetch: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            artifact_extension: DEFAULT_EXTENSION.to_string(),
            probe_before_fetch: true,
        }
    }
}

// == Cache Mode ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Artifacts are stored and served locally
    Cached,
    /// Storage unavailable; remote locators are passed through
    Degraded,
}

// == Obtained ==
/// Handle returned by [`FetchCoordinator::obtain`].
#[derive(Debug, Clone, PartialEq)]
pub struct Obtained {
    pub key: CacheKey,
    /// Where the caller should read the artifact from
    pub handle: ArtifactLocation,
    /// True only when an existing entry was served without a transfer
    pub from_cache: bool,
    pub size_bytes: Option<u64>,
    /// Age of the served entry in whole minutes, for cache hits
    pub age_minutes: Option<i64>,
}

impl Obtained {
    fn hit(entry: CacheEntry) -> Self {
        let age_minutes = Some(entry.age_minutes(Utc::now()));
        Self {
            key: entry.key,
            handle: entry.location,
            from_cache: true,
            size_bytes: entry.size_bytes,
            age_minutes,
        }
    }

    fn fetched(entry: CacheEntry) -> Self {
        Self {
            key: entry.key,
            handle: entry.location,
            from_cache: false,
            size_bytes: entry.size_bytes,
            age_minutes: None,
        }
    }
}

// == Fetch Coordinator ==
/// Explicitly constructed cache service handed to consumers.
///
/// Lifecycle: [`initialize`](Self::initialize) before use,
/// [`dispose`](Self::dispose) when done. Until `initialize` succeeds every
/// `obtain` passes the remote locator through.
#[derive(Debug)]
pub struct FetchCoordinator {
    store: Arc<CacheStore>,
    policy: Arc<EvictionPolicy>,
    fetcher: Arc<dyn RemoteFetcher>,
    /// One transfer per key at a time
    inflight: KeyLocks,
    options: FetchOptions,
    degraded: AtomicBool,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl FetchCoordinator {
    // == Constructor ==
    pub fn new(
        store: Arc<CacheStore>,
        policy: Arc<EvictionPolicy>,
        fetcher: Arc<dyn RemoteFetcher>,
        options: FetchOptions,
    ) -> Self {
        Self {
            store,
            policy,
            fetcher,
            inflight: KeyLocks::new(),
            options,
            degraded: AtomicBool::new(true),
            maintenance: Mutex::new(None),
        }
    }

    /// Wires a coordinator from configuration: backend, store, eviction
    /// policy and HTTP fetcher.
    pub fn from_config(config: &Config) -> Result<Self> {
        let eviction = config.eviction_config();
        let store = CacheStore::new(config.build_backend(), eviction.max_age, eviction.max_size_bytes);
        let fetcher = HttpFetcher::new(config.fetch_timeout(), config.probe_timeout())?;

        Ok(Self::new(
            Arc::new(store),
            Arc::new(EvictionPolicy::new(eviction)),
            Arc::new(fetcher),
            FetchOptions {
                artifact_extension: config.artifact_extension.clone(),
                probe_before_fetch: config.probe_before_fetch,
            },
        ))
    }

    // == Initialize ==
    /// Prepares the backing storage.
    ///
    /// Storage failures are not fatal: the coordinator switches to degraded
    /// mode and keeps serving remote locators directly.
    pub async fn initialize(&self) -> CacheMode {
        match self.store.initialize().await {
            Ok(()) => {
                self.degraded.store(false, Ordering::SeqCst);
                CacheMode::Cached
            }
            Err(err) => {
                warn!(error = %err, "Cache storage unavailable, passing sources through");
                self.degraded.store(true, Ordering::SeqCst);
                CacheMode::Degraded
            }
        }
    }

    // == Dispose ==
    /// Stops background maintenance and stops touching storage. Later calls
    /// to `obtain` pass through until `initialize` or a successful `clear`
    /// runs again. Either of those resumes caching but not maintenance; call
    /// `start_maintenance` again if periodic eviction is still wanted.
    pub fn dispose(&self) {
        if let Some(handle) = self
            .maintenance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.degraded.store(true, Ordering::SeqCst);
        info!("Cache coordinator disposed");
    }

    /// Starts periodic eviction, replacing any previous maintenance task.
    pub fn start_maintenance(self: &Arc<Self>, interval: Duration) {
        let handle = spawn_maintenance_task(self.clone(), interval);
        let previous = self
            .maintenance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub fn mode(&self) -> CacheMode {
        if self.degraded.load(Ordering::SeqCst) {
            CacheMode::Degraded
        } else {
            CacheMode::Cached
        }
    }

    fn is_degraded(&self) -> bool {
        self.mode() == CacheMode::Degraded
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Storage key for a remote identifier.
    pub fn key_for(&self, remote_id: &str) -> Result<CacheKey> {
        if remote_id.is_empty() {
            return Err(CacheError::InvalidSource(
                "remote identifier is empty".to_string(),
            ));
        }
        Ok(CacheKey::from_remote_id(
            remote_id,
            &self.options.artifact_extension,
        ))
    }

    // == Obtain ==
    /// Returns a handle for the artifact identified by `remote_id`.
    ///
    /// A live cached entry is returned without touching the network.
    /// Otherwise `source` is validated, optionally probed, transferred into
    /// the store and an eviction pass runs before the handle is returned.
    /// Concurrent calls for the same key share one transfer.
    pub async fn obtain(&self, remote_id: &str, source: &str) -> Result<Obtained> {
        let key = self.key_for(remote_id)?;

        if self.is_degraded() {
            return self.pass_through(key, source);
        }

        if let Lookup::Found(entry) = self.store.lookup(&key).await {
            debug!(key = %key, "Serving artifact from cache");
            return Ok(Obtained::hit(entry));
        }

        let url = validate_source(source)?;
        let flight = self.inflight.acquire(key.stem()).await;

        // Another obtain for this key may have finished while we waited.
        if let Lookup::Found(entry) = self.store.lookup_uncounted(&key).await {
            self.store.counters().record_hit();
            debug!(key = %key, "Artifact stored by concurrent transfer");
            return Ok(Obtained::hit(entry));
        }

        if self.options.probe_before_fetch {
            self.fetcher.probe(&url).await?;
        }

        let artifact = if self.store.retains_bytes() {
            self.fetcher.open(&url).await?
        } else {
            ArtifactSource::Reference(source.trim().to_string())
        };

        let entry = self.store.insert(&key, artifact).await?;
        self.store.counters().record_fetch();
        drop(flight);

        match self.policy.run(&self.store, Some(&key)).await {
            Ok(report) => debug!(
                key = %key,
                evicted = report.evicted,
                expired = report.expired,
                coalesced = report.coalesced,
                "Post-insert eviction finished"
            ),
            Err(err) => warn!(key = %key, error = %err, "Post-insert eviction failed"),
        }

        Ok(Obtained::fetched(entry))
    }

    fn pass_through(&self, key: CacheKey, source: &str) -> Result<Obtained> {
        validate_source(source)?;
        self.store.counters().record_passthrough();
        debug!(key = %key, "Storage unavailable, passing source through");

        Ok(Obtained {
            key,
            handle: ArtifactLocation::Remote(source.trim().to_string()),
            from_cache: false,
            size_bytes: None,
            age_minutes: None,
        })
    }

    // == Diagnostics ==
    /// Looks up a live entry without fetching.
    pub async fn lookup(&self, remote_id: &str) -> Result<Lookup> {
        let key = self.key_for(remote_id)?;
        if self.is_degraded() {
            return Ok(Lookup::Miss);
        }
        Ok(self.store.lookup(&key).await)
    }

    /// Removes the entry for `remote_id`, if any.
    pub async fn remove(&self, remote_id: &str) -> Result<bool> {
        let key = self.key_for(remote_id)?;
        if self.is_degraded() {
            return Ok(false);
        }
        Ok(self.store.remove(&key).await)
    }

    /// Wipes the cache. A successful clear also re-prepares the backing
    /// area, so it leaves degraded mode.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        self.degraded.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Runs an eviction pass outside of any insertion.
    pub async fn evict(&self) -> Result<EvictionReport> {
        if self.is_degraded() {
            return Err(CacheError::StorageUnavailable(
                "cache is running in pass-through mode".to_string(),
            ));
        }
        self.policy.run(&self.store, None).await
    }

    pub async fn stats(&self) -> CacheStats {
        let mut stats = if self.is_degraded() {
            self.store.activity_stats()
        } else {
            self.store.stats().await
        };
        stats.degraded = self.is_degraded();
        stats
    }
}

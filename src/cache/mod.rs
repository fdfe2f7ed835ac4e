//! Cache Module
//!
//! Provides local artifact caching with TTL expiry and size-bounded eviction.

pub mod backend;
mod entry;
pub mod eviction;
mod key;
mod locks;
mod stats;
mod store;


// Re-export public types
pub use backend::{ArtifactSource, EphemeralBackend, PersistentBackend, StorageBackend};
pub use entry::{ArtifactLocation, CacheEntry};
pub use eviction::{EvictionConfig, EvictionPlan, EvictionPolicy, EvictionReport};
pub use key::{CacheKey, DEFAULT_EXTENSION, PLACEHOLDER};
pub use locks::{KeyGuard, KeyLocks};
pub use stats::{CacheCounters, CacheStats};
pub use store::{CacheStore, Lookup};

// == Public Constants ==
/// Default size budget (100 MiB)
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Default TTL in seconds (24 hours)
pub const DEFAULT_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Default fraction of the budget eviction shrinks to
pub const DEFAULT_TARGET_FILL_RATIO: f64 = 0.8;

//! Response DTOs for the diagnostic API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::Utc;
use serde::Serialize;

use crate::cache::{CacheEntry, CacheStats, EvictionReport};
use crate::fetch::{CacheMode, Obtained};

/// Response body for POST /obtain
#[derive(Debug, Clone, Serialize)]
pub struct ObtainResponse {
    /// Storage key the artifact lives under
    pub key: String,
    /// Where the caller should read the artifact from
    pub handle: String,
    /// True when no local copy exists and `handle` is the remote locator
    pub remote: bool,
    pub from_cache: bool,
    pub size_bytes: Option<u64>,
    pub age_minutes: Option<i64>,
}

impl From<Obtained> for ObtainResponse {
    fn from(obtained: Obtained) -> Self {
        Self {
            key: obtained.key.to_string(),
            handle: obtained.handle.describe(),
            remote: !obtained.handle.is_local(),
            from_cache: obtained.from_cache,
            size_bytes: obtained.size_bytes,
            age_minutes: obtained.age_minutes,
        }
    }
}

/// Response body for GET /entries/:id
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    pub key: String,
    pub location: String,
    pub size_bytes: Option<u64>,
    /// Creation or last-write time in ISO 8601 format
    pub written_at: String,
    pub age_minutes: i64,
}

impl From<CacheEntry> for EntryResponse {
    fn from(entry: CacheEntry) -> Self {
        Self {
            age_minutes: entry.age_minutes(Utc::now()),
            key: entry.key.to_string(),
            location: entry.location.describe(),
            size_bytes: entry.size_bytes,
            written_at: entry.written_at.to_rfc3339(),
        }
    }
}

/// Response body for DELETE /entries/:id
#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    /// Success message
    pub message: String,
    /// The identifier that was removed
    pub id: String,
}

impl RemoveResponse {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            message: format!("Entry '{}' removed successfully", id),
            id,
        }
    }
}

/// Response body for POST /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared successfully".to_string(),
        }
    }
}

/// Response body for POST /evict
#[derive(Debug, Clone, Serialize)]
pub struct EvictResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: EvictionReport,
}

impl From<EvictionReport> for EvictResponse {
    fn from(report: EvictionReport) -> Self {
        Self {
            message: format!(
                "Removed {} expired and {} oversize entries",
                report.expired, report.evicted
            ),
            report,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub entry_count: usize,
    pub unknown_size_entries: usize,
    /// Occupied size in MiB, two decimals
    pub total_size_mb: f64,
    /// Size budget in MiB, two decimals
    pub max_size_mb: f64,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub fetches: u64,
    pub passthroughs: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub degraded: bool,
    pub backing_location: String,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            total_size_mb: stats.total_size_mb(),
            max_size_mb: stats.max_size_mb(),
            hit_rate: stats.hit_rate(),
            entry_count: stats.entry_count,
            unknown_size_entries: stats.unknown_size_entries,
            hits: stats.hits,
            misses: stats.misses,
            expirations: stats.expirations,
            evictions: stats.evictions,
            fetches: stats.fetches,
            passthroughs: stats.passthroughs,
            degraded: stats.degraded,
            backing_location: stats.backing_location,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Whether artifacts are cached or passed through
    pub mode: CacheMode,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(mode: CacheMode) -> Self {
        Self {
            status: "healthy".to_string(),
            mode,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    EphemeralBackend, EvictionConfig, PersistentBackend, StorageBackend, DEFAULT_EXTENSION,
    DEFAULT_MAX_AGE_SECS, DEFAULT_MAX_SIZE_BYTES, DEFAULT_TARGET_FILL_RATIO,
};

/// Storage backend selected by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Files under `cache_dir`
    Persistent,
    /// In-memory buffers
    Ephemeral,
    /// In-memory references to remote locators
    EphemeralReference,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" | "disk" => Ok(BackendKind::Persistent),
            "ephemeral" | "memory" => Ok(BackendKind::Ephemeral),
            "ephemeral-reference" | "reference" => Ok(BackendKind::EphemeralReference),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for the persistent backend
    pub cache_dir: PathBuf,
    /// Which storage backend to use
    pub backend: BackendKind,
    /// Size budget in bytes
    pub max_size_bytes: u64,
    /// TTL in seconds
    pub max_age_secs: u64,
    /// Fraction of the budget eviction shrinks to, in (0, 1]
    pub target_fill_ratio: f64,
    /// Suffix appended to artifact names
    pub artifact_extension: String,
    /// Upper bound for a whole transfer, in seconds
    pub fetch_timeout_secs: u64,
    /// Upper bound for a reachability probe, in seconds
    pub probe_timeout_secs: u64,
    /// Probe the source before transferring
    pub probe_before_fetch: bool,
    /// Periodic eviction interval in seconds, 0 disables it
    pub maintenance_interval_secs: u64,
    /// Diagnostic HTTP server port
    pub server_port: u16,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio.min(1.0)
    } else {
        DEFAULT_TARGET_FILL_RATIO
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - Persistent cache root (default: audio_cache)
    /// - `CACHE_BACKEND` - persistent, ephemeral or ephemeral-reference (default: persistent)
    /// - `MAX_SIZE_BYTES` - Size budget (default: 100 MiB)
    /// - `MAX_AGE_SECS` - TTL in seconds (default: 86400)
    /// - `TARGET_FILL_RATIO` - Eviction target fraction (default: 0.8)
    /// - `ARTIFACT_EXTENSION` - Artifact suffix (default: m4a)
    /// - `FETCH_TIMEOUT_SECS` - Transfer timeout (default: 60)
    /// - `PROBE_TIMEOUT_SECS` - Probe timeout (default: 10)
    /// - `PROBE_BEFORE_FETCH` - Probe before transfer (default: true)
    /// - `MAINTENANCE_INTERVAL_SECS` - Periodic eviction, 0 = off (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            backend: env_or("CACHE_BACKEND", defaults.backend),
            max_size_bytes: env_or("MAX_SIZE_BYTES", defaults.max_size_bytes),
            max_age_secs: env_or("MAX_AGE_SECS", defaults.max_age_secs),
            target_fill_ratio: clamp_ratio(env_or("TARGET_FILL_RATIO", defaults.target_fill_ratio)),
            artifact_extension: env::var("ARTIFACT_EXTENSION")
                .ok()
                .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .unwrap_or(defaults.artifact_extension),
            fetch_timeout_secs: env_or("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs),
            probe_timeout_secs: env_or("PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs),
            probe_before_fetch: env_or("PROBE_BEFORE_FETCH", defaults.probe_before_fetch),
            maintenance_interval_secs: env_or(
                "MAINTENANCE_INTERVAL_SECS",
                defaults.maintenance_interval_secs,
            ),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    /// Limits for the eviction policy.
    pub fn eviction_config(&self) -> EvictionConfig {
        // chrono durations top out at i64::MAX milliseconds
        let max_age_secs = i64::try_from(self.max_age_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);

        EvictionConfig {
            max_size_bytes: self.max_size_bytes,
            max_age: chrono::Duration::seconds(max_age_secs),
            target_fill_ratio: clamp_ratio(self.target_fill_ratio),
        }
    }

    /// Builds the configured storage backend.
    pub fn build_backend(&self) -> Arc<dyn StorageBackend> {
        match self.backend {
            BackendKind::Persistent => Arc::new(
                PersistentBackend::new(self.cache_dir.clone())
                    .with_extension(self.artifact_extension.clone()),
            ),
            BackendKind::Ephemeral => Arc::new(EphemeralBackend::new()),
            BackendKind::EphemeralReference => Arc::new(EphemeralBackend::by_reference()),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// None when periodic maintenance is disabled.
    pub fn maintenance_interval(&self) -> Option<Duration> {
        (self.maintenance_interval_secs > 0)
            .then(|| Duration::from_secs(self.maintenance_interval_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("audio_cache"),
            backend: BackendKind::Persistent,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            target_fill_ratio: DEFAULT_TARGET_FILL_RATIO,
            artifact_extension: DEFAULT_EXTENSION.to_string(),
            fetch_timeout_secs: 60,
            probe_timeout_secs: 10,
            probe_before_fetch: true,
            maintenance_interval_secs: 0,
            server_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.max_age_secs, 24 * 60 * 60);
        assert_eq!(config.target_fill_ratio, 0.8);
        assert_eq!(config.artifact_extension, "m4a");
        assert_eq!(config.backend, BackendKind::Persistent);
        assert_eq!(config.server_port, 3000);
        assert!(config.maintenance_interval().is_none());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "CACHE_DIR",
            "CACHE_BACKEND",
            "MAX_SIZE_BYTES",
            "MAX_AGE_SECS",
            "TARGET_FILL_RATIO",
            "ARTIFACT_EXTENSION",
            "FETCH_TIMEOUT_SECS",
            "PROBE_TIMEOUT_SECS",
            "PROBE_BEFORE_FETCH",
            "MAINTENANCE_INTERVAL_SECS",
            "SERVER_PORT",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.cache_dir, PathBuf::from("audio_cache"));
        assert_eq!(config.max_size_bytes, DEFAULT_MAX_SIZE_BYTES);
        assert_eq!(config.max_age_secs, DEFAULT_MAX_AGE_SECS);
        assert_eq!(config.fetch_timeout_secs, 60);
        assert!(config.probe_before_fetch);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("persistent".parse::<BackendKind>(), Ok(BackendKind::Persistent));
        assert_eq!("Memory".parse::<BackendKind>(), Ok(BackendKind::Ephemeral));
        assert_eq!(
            "ephemeral-reference".parse::<BackendKind>(),
            Ok(BackendKind::EphemeralReference)
        );
        assert!("s3".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_ratio_clamped() {
        assert_eq!(clamp_ratio(1.5), 1.0);
        assert_eq!(clamp_ratio(0.0), DEFAULT_TARGET_FILL_RATIO);
        assert_eq!(clamp_ratio(f64::NAN), DEFAULT_TARGET_FILL_RATIO);
        assert_eq!(clamp_ratio(0.5), 0.5);
    }

    #[test]
    fn test_eviction_config() {
        let config = Config {
            max_size_bytes: 1000,
            max_age_secs: 60,
            target_fill_ratio: 0.5,
            ..Config::default()
        };
        let eviction = config.eviction_config();
        assert_eq!(eviction.max_size_bytes, 1000);
        assert_eq!(eviction.max_age, chrono::Duration::seconds(60));
        assert_eq!(eviction.target_size_bytes(), 500);
    }

    #[test]
    fn test_build_backend() {
        let config = Config {
            backend: BackendKind::EphemeralReference,
            ..Config::default()
        };
        assert!(!config.build_backend().retains_bytes());

        let config = Config::default();
        assert_eq!(config.build_backend().descriptor(), "audio_cache");
    }
}

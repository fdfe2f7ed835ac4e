//! Cache Entry Module
//!
//! Defines the structure for individual cached artifacts with age tracking.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

use crate::cache::CacheKey;

// == Artifact Location ==
/// Read-only reference to a stored artifact.
#[derive(Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// File inside the persistent backing directory
    File(PathBuf),
    /// In-process buffer held by the ephemeral backend
    Memory(Bytes),
    /// Remote locator, used when nothing is stored locally
    Remote(String),
}

impl ArtifactLocation {
    /// Human-readable descriptor suitable for logs and diagnostics.
    pub fn describe(&self) -> String {
        match self {
            ArtifactLocation::File(path) => path.display().to_string(),
            ArtifactLocation::Memory(bytes) => format!("memory://{} bytes", bytes.len()),
            ArtifactLocation::Remote(url) => url.clone(),
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, ArtifactLocation::Remote(_))
    }
}

impl fmt::Debug for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactLocation::File(path) => f.debug_tuple("File").field(path).finish(),
            ArtifactLocation::Memory(bytes) => f.debug_tuple("Memory").field(&bytes.len()).finish(),
            ArtifactLocation::Remote(url) => f.debug_tuple("Remote").field(url).finish(),
        }
    }
}

// == Cache Entry ==
/// Represents a single cached artifact and its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Storage-safe key
    pub key: CacheKey,
    /// Where the artifact lives
    pub location: ArtifactLocation,
    /// Size of the artifact, None when the backend cannot report it
    pub size_bytes: Option<u64>,
    /// Creation or last-write timestamp
    pub written_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Age ==
    /// Time elapsed since the entry was written.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.written_at)
    }

    /// Age rounded to whole minutes.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (self.age(now).num_seconds() + 30) / 60
    }

    // == Is Expired ==
    /// Checks whether the entry has outlived `max_age`.
    ///
    /// Boundary condition: an entry exactly `max_age` old is still live; it
    /// expires once its age strictly exceeds `max_age`.
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }
}

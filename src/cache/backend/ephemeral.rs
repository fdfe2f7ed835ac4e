//! Ephemeral Backend
//!
//! In-process storage for hosts without a writable directory. Contents are
//! lost when the process exits.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::{ArtifactSource, StorageBackend};
use crate::cache::{ArtifactLocation, CacheEntry, CacheKey};
use crate::error::Result;

// == Ephemeral Backend ==
/// Memory-backed storage.
///
/// By default payloads are buffered in memory. A backend built with
/// [`EphemeralBackend::by_reference`] records the remote locator instead;
/// those entries have no known size.
#[derive(Debug, Default)]
pub struct EphemeralBackend {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    by_reference: bool,
}

impl EphemeralBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_reference() -> Self {
        Self {
            by_reference: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl StorageBackend for EphemeralBackend {
    fn descriptor(&self) -> String {
        if self.by_reference {
            "memory (references)".to_string()
        } else {
            "memory".to_string()
        }
    }

    fn retains_bytes(&self) -> bool {
        !self.by_reference
    }

    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    async fn stat(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &CacheKey, source: ArtifactSource) -> Result<CacheEntry> {
        let (location, size_bytes) = match source {
            ArtifactSource::Reference(url) => (ArtifactLocation::Remote(url), None),
            other => {
                // Buffer fully before touching the map so a failed stream
                // leaves the previous entry in place.
                let bytes = other.collect().await?.unwrap_or_default();
                let size = bytes.len() as u64;
                (ArtifactLocation::Memory(bytes), Some(size))
            }
        };

        let entry = CacheEntry {
            key: key.clone(),
            location,
            size_bytes,
            written_at: Utc::now(),
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.clone(), entry.clone());
        Ok(entry)
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.values().cloned().collect())
    }

    async fn wipe(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        Ok(())
    }
}

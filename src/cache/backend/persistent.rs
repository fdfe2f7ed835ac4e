//! Persistent Backend
//!
//! Stores each artifact as `root/<stem>.<ext>`. Writes land in a hidden
//! partial file first and are renamed into place only once complete.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{future, stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{ArtifactSource, ByteStream, StorageBackend};
use crate::cache::{ArtifactLocation, CacheEntry, CacheKey, DEFAULT_EXTENSION};
use crate::error::{CacheError, Result};

static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

// == Persistent Backend ==
/// Filesystem-backed storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct PersistentBackend {
    root: PathBuf,
    /// Only files with this suffix are cache entries
    extension: String,
}

impl PersistentBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Restricts listings to artifacts named `<stem>.<extension>`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of the artifact for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn partial_path_for(&self, key: &CacheKey) -> PathBuf {
        let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(".{}.{}.part", key.file_name(), seq))
    }
}

fn entry_from_metadata(key: CacheKey, path: PathBuf, metadata: &std::fs::Metadata) -> CacheEntry {
    let written_at = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    CacheEntry {
        key,
        location: ArtifactLocation::File(path),
        size_bytes: Some(metadata.len()),
        written_at,
    }
}

fn write_failed(path: &Path, err: std::io::Error) -> CacheError {
    CacheError::WriteFailed(format!("{}: {}", path.display(), err))
}

// == Partial File ==
/// Removes an unfinished partial file when dropped, including when the
/// writing future is cancelled.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = std::fs::remove_file(&path) {
                if err.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "Failed to remove partial artifact");
                }
            }
        }
    }
}

#[async_trait]
impl StorageBackend for PersistentBackend {
    fn descriptor(&self) -> String {
        self.root.display().to_string()
    }

    async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|err| {
            CacheError::StorageUnavailable(format!("{}: {}", self.root.display(), err))
        })?;

        let metadata = fs::metadata(&self.root).await.map_err(|err| {
            CacheError::StorageUnavailable(format!("{}: {}", self.root.display(), err))
        })?;

        if !metadata.is_dir() {
            return Err(CacheError::StorageUnavailable(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(CacheError::StorageUnavailable(format!(
                "{} is read-only",
                self.root.display()
            )));
        }

        Ok(())
    }

    async fn stat(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {
                Ok(Some(entry_from_metadata(key.clone(), path, &metadata)))
            }
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CacheError::Internal(format!("{}: {}", path.display(), err))),
        }
    }

    async fn write(&self, key: &CacheKey, source: ArtifactSource) -> Result<CacheEntry> {
        let mut chunks: ByteStream = match source {
            ArtifactSource::Bytes(bytes) => stream::once(future::ready(Ok(bytes))).boxed(),
            ArtifactSource::Stream(chunks) => chunks,
            ArtifactSource::Reference(url) => {
                return Err(CacheError::WriteFailed(format!(
                    "cannot persist a bare reference to {}",
                    url
                )))
            }
        };

        let partial = self.partial_path_for(key);
        let final_path = self.path_for(key);

        let mut file = fs::File::create(&partial)
            .await
            .map_err(|err| write_failed(&partial, err))?;
        let mut guard = PartialFile::new(partial.clone());

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|err| write_failed(&partial, err))?;
        }

        file.sync_all()
            .await
            .map_err(|err| write_failed(&partial, err))?;
        drop(file);

        fs::rename(&partial, &final_path)
            .await
            .map_err(|err| write_failed(&final_path, err))?;
        guard.disarm();

        let metadata = fs::metadata(&final_path)
            .await
            .map_err(|err| write_failed(&final_path, err))?;

        debug!(key = %key, path = %final_path.display(), size_bytes = metadata.len(), "Artifact written");
        Ok(entry_from_metadata(key.clone(), final_path, &metadata))
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(CacheError::Internal(format!("{}: {}", path.display(), err))),
        }
    }

    async fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut dir = fs::read_dir(&self.root).await.map_err(|err| {
            CacheError::StorageUnavailable(format!("{}: {}", self.root.display(), err))
        })?;

        let mut entries = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|err| CacheError::Internal(err.to_string()))?
        {
            let Some(key) = item.file_name().to_str().and_then(CacheKey::from_file_name) else {
                continue;
            };
            // Leftovers from another extension are never looked up, so they
            // are not entries.
            if key.extension() != self.extension {
                continue;
            }

            // Raced with a delete or rename; skip it.
            let Ok(metadata) = item.metadata().await else {
                continue;
            };
            if metadata.is_file() {
                entries.push(entry_from_metadata(key, item.path(), &metadata));
            }
        }

        Ok(entries)
    }

    async fn wipe(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(CacheError::Internal(format!(
                    "{}: {}",
                    self.root.display(),
                    err
                )))
            }
        }
        self.prepare().await
    }
}

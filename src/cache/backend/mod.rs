//! Storage Backend Module
//!
//! Polymorphic storage for artifacts. The backend is chosen once, when the
//! cache is constructed; nothing above this layer branches on it.
//!
//! # Variants
//! - [`PersistentBackend`]: one file per artifact under a root directory
//! - [`EphemeralBackend`]: in-process map, for hosts without writable storage

mod ephemeral;
mod persistent;

use std::fmt;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::cache::{CacheEntry, CacheKey};
use crate::error::Result;

pub use ephemeral::EphemeralBackend;
pub use persistent::PersistentBackend;

/// Chunked byte stream; a chunk error aborts the write.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

// == Artifact Source ==
/// Bytes to materialize under a key.
pub enum ArtifactSource {
    /// Complete payload already in memory
    Bytes(Bytes),
    /// Payload arriving incrementally, typically from a network transfer
    Stream(ByteStream),
    /// Remote locator recorded in place of the payload
    Reference(String),
}

impl ArtifactSource {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        ArtifactSource::Stream(stream.boxed())
    }

    /// Collects the whole payload into one buffer.
    ///
    /// Returns None for a bare reference.
    pub async fn collect(self) -> Result<Option<Bytes>> {
        match self {
            ArtifactSource::Bytes(bytes) => Ok(Some(bytes)),
            ArtifactSource::Stream(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(Some(buffer.freeze()))
            }
            ArtifactSource::Reference(_) => Ok(None),
        }
    }
}

impl fmt::Debug for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactSource::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            ArtifactSource::Stream(_) => f.write_str("Stream(..)"),
            ArtifactSource::Reference(url) => f.debug_tuple("Reference").field(url).finish(),
        }
    }
}

// == Storage Backend ==
/// Physical storage for cached artifacts.
///
/// Backends carry no expiry or eviction logic; they report what is stored
/// and perform all-or-nothing writes. Mutual exclusion per key is the
/// caller's job.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Where the backend keeps its data, for diagnostics.
    fn descriptor(&self) -> String;

    /// Whether writes store payload bytes. When false the backend only
    /// records references and callers can skip the transfer.
    fn retains_bytes(&self) -> bool {
        true
    }

    /// Idempotently prepares the backing area.
    ///
    /// Fails with `StorageUnavailable` if it cannot be prepared.
    async fn prepare(&self) -> Result<()>;

    /// Returns the stored entry for `key`, if any, regardless of age.
    async fn stat(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Materializes `source` under `key`, replacing any previous artifact.
    ///
    /// On error the previous artifact, if any, is left untouched and nothing
    /// partial becomes visible.
    async fn write(&self, key: &CacheKey, source: ArtifactSource) -> Result<CacheEntry>;

    /// Deletes the artifact. Returns false if there was none.
    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// Lists every stored entry.
    async fn list(&self) -> Result<Vec<CacheEntry>>;

    /// Removes everything and prepares the backing area again.
    async fn wipe(&self) -> Result<()>;
}

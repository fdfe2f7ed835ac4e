//! Fetch Module
//!
//! Resolves artifact handles: from the cache when possible, otherwise by
//! transferring from the remote source into the cache.

mod coordinator;
pub mod remote;

pub use coordinator::{CacheMode, FetchCoordinator, FetchOptions, Obtained};
pub use remote::{validate_source, HttpFetcher, RemoteFetcher};

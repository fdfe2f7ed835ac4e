//! Remote retrieval
//!
//! Validation of remote locators and the HTTP client used to probe and
//! transfer artifacts.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::cache::ArtifactSource;
use crate::error::{CacheError, Result};

/// URI schemes the fetcher knows how to retrieve.
pub const SUPPORTED_SCHEMES: &[&str] = &["http", "https"];

/// Checks that `raw` is a retrievable locator.
pub fn validate_source(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|err| CacheError::InvalidSource(format!("{}: {}", raw, err)))?;

    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(CacheError::InvalidSource(format!(
            "unsupported scheme '{}' in {}",
            url.scheme(),
            raw
        )));
    }
    if url.host_str().is_none() {
        return Err(CacheError::InvalidSource(format!("missing host in {}", raw)));
    }

    Ok(url)
}

// == Remote Fetcher ==
/// Retrieves artifacts from remote locators.
#[async_trait]
pub trait RemoteFetcher: Send + Sync + fmt::Debug {
    /// Lightweight existence check. Fails with `SourceUnreachable`.
    async fn probe(&self, url: &Url) -> Result<()>;

    /// Starts a transfer and returns its body as a stream. Fails with
    /// `FetchFailed`; chunk errors surface as `FetchFailed` too.
    async fn open(&self, url: &Url) -> Result<ArtifactSource>;
}

// == HTTP Fetcher ==
/// `reqwest`-based fetcher. Probes with `HEAD`, transfers with `GET`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    probe_timeout: Duration,
}

impl HttpFetcher {
    /// Builds a fetcher whose transfers, body included, are bounded by
    /// `fetch_timeout` and whose probes are bounded by `probe_timeout`.
    pub fn new(fetch_timeout: Duration, probe_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|err| CacheError::Internal(format!("HTTP client: {}", err)))?;

        Ok(Self {
            client,
            probe_timeout,
        })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn probe(&self, url: &Url) -> Result<()> {
        debug!(url = %url, "Probing remote source");

        let response = self
            .client
            .head(url.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|err| {
                warn!(url = %url, error = %err, "Remote source not reachable");
                CacheError::SourceUnreachable(format!("{}: {}", url, err))
            })?;

        if !response.status().is_success() {
            warn!(url = %url, status = %response.status(), "Remote source not reachable");
            return Err(CacheError::SourceUnreachable(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        Ok(())
    }

    async fn open(&self, url: &Url) -> Result<ArtifactSource> {
        debug!(url = %url, "Starting transfer");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| CacheError::FetchFailed(format!("{}: {}", url, err)))?;

        if !response.status().is_success() {
            return Err(CacheError::FetchFailed(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let source = url.to_string();
        let body = response
            .bytes_stream()
            .map_err(move |err| CacheError::FetchFailed(format!("{}: {}", source, err)));

        Ok(ArtifactSource::from_stream(body))
    }
}

//! Error types for the audio cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the audio cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing area cannot be created or opened
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Remote locator failed validation
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Reachability probe failed or timed out
    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),

    /// Transfer started but did not complete
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Bytes were received but could not be persisted locally
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// No live entry under the requested key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Whether the caller may reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CacheError::SourceUnreachable(_) | CacheError::FetchFailed(_)
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidSource(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::SourceUnreachable(_) | CacheError::FetchFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            CacheError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::WriteFailed(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the audio cache.
pub type Result<T> = std::result::Result<T, CacheError>;

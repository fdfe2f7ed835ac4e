//! Request DTOs for the diagnostic API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Longest remote identifier accepted over HTTP.
pub const MAX_ID_LENGTH: usize = 256;

/// Request body for POST /obtain
///
/// # Fields
/// - `id`: Remote identifier the artifact is cached under
/// - `url`: Remote locator to transfer from on a miss
/// - `title`: Optional human-readable label, only used in logs
#[derive(Debug, Clone, Deserialize)]
pub struct ObtainRequest {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl ObtainRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.id.is_empty() {
            return Some("Id cannot be empty".to_string());
        }
        if self.id.chars().count() > MAX_ID_LENGTH {
            return Some(format!(
                "Id exceeds maximum length of {} characters",
                MAX_ID_LENGTH
            ));
        }
        if self.url.trim().is_empty() {
            return Some("Url cannot be empty".to_string());
        }
        None
    }
}

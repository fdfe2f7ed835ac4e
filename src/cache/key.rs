//! Cache Key Module
//!
//! Maps raw remote identifiers to storage-safe artifact names.

use std::fmt;

/// Character substituted for anything outside `[A-Za-z0-9]`.
pub const PLACEHOLDER: char = '_';

/// Artifact-type suffix used when none is configured.
pub const DEFAULT_EXTENSION: &str = "m4a";

// == Cache Key ==
/// Storage-safe identifier for one cached artifact.
///
/// The stem is the sanitized remote identifier; the file name is
/// `<stem>.<extension>`. Distinct identifiers can collapse onto the same
/// stem (`a-b` and `a.b` both become `a_b`), in which case they share an
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    stem: String,
    extension: String,
}

impl CacheKey {
    // == Constructor ==
    /// Derives a key from a remote identifier.
    ///
    /// Every character outside `[A-Za-z0-9]` becomes [`PLACEHOLDER`].
    pub fn from_remote_id(remote_id: &str, extension: &str) -> Self {
        let stem = remote_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c
                } else {
                    PLACEHOLDER
                }
            })
            .collect();

        Self {
            stem,
            extension: extension.to_string(),
        }
    }

    // == Parse File Name ==
    /// Recovers a key from a file name found in the backing directory.
    ///
    /// Returns None for names that this naming rule could not have produced.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        let valid_stem = !stem.is_empty()
            && stem
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == PLACEHOLDER);

        if !valid_stem || extension.is_empty() {
            return None;
        }

        Some(Self {
            stem: stem.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns `<stem>.<extension>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stem, self.extension)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stem, self.extension)
    }
}

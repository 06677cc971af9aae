//! Error types for bundle operations.

use crate::hash::IntegrityError;
use thiserror::Error;

/// Errors that can occur during bundle operations.
///
/// A bundle that merely fails validation is not an error: validation
/// problems are reported as data through [`crate::ValidationReport`].
#[derive(Debug, Error)]
pub enum BundleError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest bytes are not a property list.
    #[error("Invalid manifest format: {0}")]
    Plist(#[from] plist::Error),

    /// Manifest is a property list but not shaped like a manifest.
    #[error("Invalid manifest format: {0}")]
    Format(String),

    /// YAML parsing or serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error while walking a directory tree.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The manifest file is missing from the bundle.
    #[error("Missing manifest: {0}")]
    MissingManifest(String),

    /// A field the caller requires is absent.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// The bundle is used in a way it cannot support.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A save request that can never succeed.
    #[error("Cannot save bundle: {0}")]
    Precondition(String),

    /// Integrity marker or expiry check failed.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

impl BundleError {
    /// Returns true for errors caused by unreadable manifest bytes.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Plist(_) | Self::Format(_))
    }
}

//! Error types for registry and layout operations

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// One failed blob transfer inside a concurrent batch.
#[derive(Debug)]
pub struct BlobFailure {
    pub digest: String,
    pub reason: String,
}

impl fmt::Display for BlobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.digest, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed image reference string
    #[error("invalid image reference: {0}")]
    Reference(String),

    /// No usable credentials could be resolved
    #[error("authentication error: {0}")]
    Auth(String),

    /// Network-level failure talking to the registry
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Registry answered outside the success range
    #[error("registry returned status {status}: {body}")]
    Protocol { status: u16, body: String },

    /// Manifest schemaVersion outside {1, 2}
    #[error("unsupported manifest schema version {0}")]
    UnsupportedSchema(u64),

    /// Malformed JSON at any parse site
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Aggregate of per-blob transfer failures
    #[error("blob transfer failed for {} blob(s): {}", .0.len(), format_failures(.0))]
    BlobTransfer(Vec<BlobFailure>),

    /// Layout read/write failure
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid digest or configuration value
    #[error("validation error: {0}")]
    Validation(String),
}

fn format_failures(failures: &[BlobFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

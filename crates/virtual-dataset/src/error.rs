//! Error types for logical datasets.

use thiserror::Error;

/// Errors that can occur while persisting or reopening a logical dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Reading or writing the dataset sidecar failed.
    #[error("dataset sidecar I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The dataset sidecar is not valid JSON for this layout.
    #[error("malformed dataset sidecar: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

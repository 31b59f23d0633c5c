//! Error types for the output sink.

use thiserror::Error;

/// Errors that can occur while writing or uploading a store.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Creating or writing the Zarr store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The dataset description is inconsistent with the data handed in.
    #[error("invalid dataset layout: {0}")]
    InvalidLayout(String),

    /// Uploading the finished store failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;

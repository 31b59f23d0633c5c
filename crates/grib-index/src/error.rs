//! Error types for GRIB2 indexing.

use thiserror::Error;

/// Errors that can occur while indexing or reading GRIB2 files.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The file or sidecar cannot be interpreted as expected.
    ///
    /// Recoverable at the merge boundary: the offending file is excluded and
    /// the run continues.
    #[error("malformed index data: {0}")]
    Malformed(String),

    /// Reading the source file failed.
    #[error("failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Decoding a message payload failed.
    #[error("failed to decode GRIB2 payload: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Result type for indexing operations.
pub type Result<T> = std::result::Result<T, IndexError>;

//! Error types for the remap engine.

use thiserror::Error;

/// Errors that can occur while building weights or applying them.
#[derive(Error, Debug)]
pub enum RemapError {
    /// The source point set cannot support a triangulation.
    #[error("degenerate source geometry: {0}")]
    DegenerateGeometry(String),

    /// A source field's spatial length does not match the weight set.
    #[error("source field has {actual} points but weights were built for {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The target grid description was invalid.
    #[error("target grid error: {0}")]
    Grid(#[from] healpix_grid::HealpixError),

    /// Reading or writing a cached weight set failed.
    #[error("weight cache error: {0}")]
    Cache(String),
}

impl From<std::io::Error> for RemapError {
    fn from(err: std::io::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for RemapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

/// Result type for remap operations.
pub type Result<T> = std::result::Result<T, RemapError>;

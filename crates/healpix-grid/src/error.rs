//! Error types for grid generation.

use thiserror::Error;

/// Errors that can occur while describing a HEALPix grid.
#[derive(Error, Debug)]
pub enum HealpixError {
    /// The requested zoom level cannot be represented.
    #[error("zoom level {zoom} exceeds the supported maximum {max}")]
    ZoomTooLarge { zoom: u32, max: u32 },

    /// The ordering name is not one of "nest"/"nested"/"ring".
    #[error("unknown pixel ordering: {0}")]
    UnknownOrdering(String),
}

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, HealpixError>;

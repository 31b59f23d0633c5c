//! Chunked output sink for remapped forecast datasets.
//!
//! Writes each logical dataset as a Zarr V3 store (coordinate arrays, a
//! grid-mapping carrier and one float32 array per variable, chunked along
//! the time and target-pixel axes) and optionally uploads the finished
//! store directory to S3-compatible object storage.
//!
//! Storage chunking is configured here and is deliberately decoupled from
//! the remap stage's work chunking: interpolation slices by (time, level)
//! for parallelism, while store chunks are sized for the access pattern of
//! downstream readers.

pub mod config;
pub mod error;
pub mod upload;
pub mod writer;

pub use config::ZarrSinkConfig;
pub use error::{Result, SinkError};
pub use upload::{upload_store, ObjectStorage, ObjectStorageConfig};
pub use writer::{DatasetWriter, WriteSummary};

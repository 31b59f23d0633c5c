//! Virtual dataset assembly over per-file GRIB2 indices.
//!
//! Takes the structural indices produced by `grib-index` (one per
//! downloaded file) and merges them into logical datasets: a uniform
//! (time, level, grid-point) coordinate system over variables whose data
//! still lives, byte for byte, in the original files. Reads stay deferred;
//! a [`ChunkRef`] names a file and byte range, and nothing is materialized
//! until the remap stage consumes a field.
//!
//! Files with missing or malformed indices degrade the merge instead of
//! failing it: their contribution is dropped and a diagnostic surfaces in
//! the [`MergeReport`].

pub mod error;
pub mod logical;
pub mod merge;

pub use error::{DatasetError, Result};
pub use logical::{ChunkRef, FieldKey, LogicalDataset, LogicalVariable, VariableMeta};
pub use merge::{
    merge_directory, merge_indices, merge_sidecars, ExcludedFile, MergeOutcome, MergeReport,
};

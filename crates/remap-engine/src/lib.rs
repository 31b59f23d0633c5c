//! Spatial remapping of scattered forecast grids onto HEALPix pixels.
//!
//! The engine takes the source grid's cell coordinates (often a reduced
//! Gaussian or otherwise irregular layout), builds a Delaunay triangulation
//! over them, derives barycentric interpolation weights for every target
//! pixel center, and applies those weights to any number of horizontal
//! fields, chunk by chunk.
//!
//! # Pipeline position
//!
//! ```text
//! LogicalDataset ──► GridPoints ──► Triangulation ──► WeightSet
//!                                                        │ (cached per
//!                                                        │  geometry)
//!        per-(time, level) fields ──► RemapApplicator ◄──┘
//!                                          │
//!                                          ▼
//!                              (time, level, pixel) arrays
//! ```
//!
//! The triangulation and weight solve run once per distinct source geometry
//! and are the superlinear step; [`WeightCache`] persists the result across
//! runs. Field application is embarrassingly parallel over (time, level)
//! chunks and shares the immutable [`WeightSet`] across threads.
//!
//! # Coordinate caveat
//!
//! Coordinates are triangulated in the (longitude, latitude) plane after
//! normalization to (-180, 180]. Simplices therefore never span the
//! antimeridian, and the poles are covered only as far as the poleward-most
//! source rings reach. Target pixels falling in those gaps are flagged
//! invalid and surface as missing values, matching the upstream source
//! grids this pipeline consumes, which keep a narrow seam at ±180°.

pub mod apply;
pub mod cache;
pub mod error;
pub mod points;
pub mod triangulation;
pub mod weights;

pub use apply::{RemapApplicator, VariableAttrs, MISSING};
pub use cache::WeightCache;
pub use error::{RemapError, Result};
pub use points::GridPoints;
pub use triangulation::Triangulation;
pub use weights::{compute_weights, WeightSet};

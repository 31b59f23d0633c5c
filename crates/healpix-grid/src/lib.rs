//! HEALPix target-grid generation.
//!
//! Produces pixel-center coordinates for the hierarchical equal-area
//! pixelization of the sphere that the remap engine resamples onto. A grid is
//! described by a zoom level `z` (nside = 2^z, 12·4^z pixels) and a pixel
//! ordering convention (nested or ring). Generation is pure and
//! deterministic: the same `(zoom, ordering)` always yields the same ordered
//! sequence of centers.

pub mod error;
mod pixel;

pub use error::{HealpixError, Result};

use serde::{Deserialize, Serialize};

/// Largest zoom level accepted.
///
/// nside = 2^13 already means ~800 M pixels; anything beyond that cannot be
/// held as a center list and is far past the resolution of any source model.
pub const MAX_ZOOM: u32 = 13;

/// Pixel ordering convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ordering {
    /// Hierarchical nested ordering (quad-tree within each base face).
    #[default]
    Nested,
    /// Ring ordering (pixels numbered along iso-latitude rings).
    Ring,
}

impl Ordering {
    /// Canonical lowercase name, as written into store attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nested => "nest",
            Self::Ring => "ring",
        }
    }
}

impl std::str::FromStr for Ordering {
    type Err = HealpixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nest" | "nested" => Ok(Self::Nested),
            "ring" => Ok(Self::Ring),
            other => Err(HealpixError::UnknownOrdering(other.to_string())),
        }
    }
}

impl std::fmt::Display for Ordering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed-resolution HEALPix grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealpixGrid {
    zoom: u32,
    ordering: Ordering,
}

impl HealpixGrid {
    /// Create a grid description for the given zoom level and ordering.
    pub fn new(zoom: u32, ordering: Ordering) -> Result<Self> {
        if zoom > MAX_ZOOM {
            return Err(HealpixError::ZoomTooLarge {
                zoom,
                max: MAX_ZOOM,
            });
        }
        Ok(Self { zoom, ordering })
    }

    /// Zoom level `z`.
    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    /// Ordering convention.
    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    /// Grid parameter nside = 2^z.
    pub fn nside(&self) -> u64 {
        1u64 << self.zoom
    }

    /// Total pixel count, 12·4^z.
    pub fn npix(&self) -> u64 {
        12 * self.nside() * self.nside()
    }

    /// Center coordinates of one pixel as (longitude, latitude) in degrees.
    ///
    /// Longitude is in (-180, 180], latitude in [-90, 90].
    ///
    /// # Panics
    /// Panics if `pix >= self.npix()`.
    pub fn pixel_center(&self, pix: u64) -> (f64, f64) {
        assert!(pix < self.npix(), "pixel index {pix} out of range");
        let (z, phi) = match self.ordering {
            Ordering::Ring => pixel::pix2loc_ring(self.nside(), pix),
            Ordering::Nested => pixel::pix2loc_nest(self.nside(), pix),
        };
        let lat = z.asin().to_degrees();
        let lon = wrap_lon(phi.to_degrees());
        (lon, lat)
    }

    /// The full ordered sequence of pixel centers, length `npix()`.
    pub fn centers(&self) -> Vec<(f64, f64)> {
        (0..self.npix()).map(|p| self.pixel_center(p)).collect()
    }
}

/// Wrap a longitude in degrees into (-180, 180].
pub fn wrap_lon(lon: f64) -> f64 {
    let mut wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

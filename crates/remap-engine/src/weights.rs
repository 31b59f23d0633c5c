//! Per-pixel interpolation weights.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use healpix_grid::HealpixGrid;

use crate::error::{RemapError, Result};
use crate::points::GridPoints;
use crate::triangulation::Triangulation;

/// Barycentric interpolation weights mapping every target pixel to a source
/// simplex.
///
/// Immutable once computed; safe to share by reference across parallel chunk
/// computations. Entries with `valid == false` mark pixels outside the convex
/// hull of the source points: their indices and weights carry no meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightSet {
    grid: HealpixGrid,
    source_len: usize,
    source_fingerprint: u64,
    indices: Vec<[u32; 3]>,
    weights: Vec<[f64; 3]>,
    valid: Vec<bool>,
}

impl WeightSet {
    /// The target grid these weights map onto.
    pub fn grid(&self) -> HealpixGrid {
        self.grid
    }

    /// Source point count the weights were built for.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Fingerprint of the source geometry used for cache keying.
    pub fn source_fingerprint(&self) -> u64 {
        self.source_fingerprint
    }

    /// Number of target pixels.
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    /// Whether the set covers no pixels (never true for a real grid).
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Entry for one target pixel: (source indices, weights, validity).
    pub fn entry(&self, pix: usize) -> ([u32; 3], [f64; 3], bool) {
        (self.indices[pix], self.weights[pix], self.valid[pix])
    }

    /// Whether a target pixel falls inside the source hull.
    pub fn is_valid(&self, pix: usize) -> bool {
        self.valid[pix]
    }

    /// Count of pixels inside the source hull.
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }
}

/// Compute interpolation weights from a source point set onto a target grid.
///
/// Builds the Delaunay triangulation (the expensive, superlinear step; reuse
/// the result via [`crate::WeightCache`] when the source geometry is stable),
/// then locates every pixel center and stores its barycentric decomposition.
/// Pixels outside the hull are recorded as invalid rather than failing.
pub fn compute_weights(points: &GridPoints, grid: HealpixGrid) -> Result<WeightSet> {
    if points.len() > u32::MAX as usize {
        return Err(RemapError::DegenerateGeometry(format!(
            "source grid of {} points exceeds the supported index range",
            points.len()
        )));
    }

    let triangulation = Triangulation::build(points)?;
    debug!(
        source_points = points.len(),
        triangles = triangulation.num_triangles(),
        "triangulation built"
    );

    let npix = grid.npix() as usize;
    let mut indices = Vec::with_capacity(npix);
    let mut weights = Vec::with_capacity(npix);
    let mut valid = Vec::with_capacity(npix);

    // Consecutive pixels are spatially coherent in both orderings, so the
    // previous hit is a good walk starting point.
    let mut hint = 0;
    for pix in 0..grid.npix() {
        let (lon, lat) = grid.pixel_center(pix);
        match triangulation.locate([lon, lat], hint) {
            Some(t) => {
                hint = t;
                let (idx, w) = triangulation.barycentric(t, [lon, lat]);
                indices.push([idx[0] as u32, idx[1] as u32, idx[2] as u32]);
                weights.push(w);
                valid.push(true);
            }
            None => {
                indices.push([0; 3]);
                weights.push([0.0; 3]);
                valid.push(false);
            }
        }
    }

    let set = WeightSet {
        grid,
        source_len: points.len(),
        source_fingerprint: points.fingerprint(),
        indices,
        weights,
        valid,
    };
    info!(
        zoom = grid.zoom(),
        ordering = %grid.ordering(),
        pixels = set.len(),
        inside_hull = set.valid_count(),
        "weights computed"
    );
    Ok(set)
}

//! Application of precomputed weights to source fields.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{RemapError, Result};
use crate::weights::WeightSet;

/// Missing-value sentinel written for pixels outside the source hull and for
/// (time, level) combinations absent from the source dataset.
pub const MISSING: f32 = f32::NAN;

/// Descriptive attributes attached to each remapped output variable.
///
/// Copied verbatim from the source variable's metadata; the applicator only
/// transports these, it never derives them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableAttrs {
    /// Human-readable name, e.g. "Temperature".
    pub long_name: String,
    /// CF standard name when known, else empty.
    pub standard_name: String,
    /// Physical units, e.g. "K".
    pub units: String,
    /// "forecast" or "analysis".
    pub data_type: String,
    /// Level family the variable lives on, e.g. "pl" or "sfc".
    pub level_type: String,
}

/// Applies a [`WeightSet`] to source fields, one independent chunk at a time.
///
/// The weight set is borrowed immutably, so one applicator (or several) can
/// serve any number of worker threads without locking.
pub struct RemapApplicator<'w> {
    weights: &'w WeightSet,
}

impl<'w> RemapApplicator<'w> {
    pub fn new(weights: &'w WeightSet) -> Self {
        Self { weights }
    }

    /// Number of output pixels per field.
    pub fn output_len(&self) -> usize {
        self.weights.len()
    }

    /// Verify a source spatial length against the weight set.
    ///
    /// Call this once at the dataset boundary before scheduling chunk work;
    /// a mismatch here means the weights were built for different geometry.
    pub fn check_source_len(&self, actual: usize) -> Result<()> {
        if actual != self.weights.source_len() {
            return Err(RemapError::DimensionMismatch {
                expected: self.weights.source_len(),
                actual,
            });
        }
        Ok(())
    }

    /// Remap one horizontal field onto the target grid.
    ///
    /// Each valid output pixel is Σ weightᵢ·source[idxᵢ] over the containing
    /// simplex's three vertices, accumulated in `f64` and down-cast to `f32`
    /// only after summation. Invalid pixels receive [`MISSING`]. A NaN at any
    /// contributing source point propagates into the output pixel.
    pub fn apply_field(&self, source: &[f32]) -> Result<Vec<f32>> {
        self.check_source_len(source.len())?;

        let mut out = Vec::with_capacity(self.weights.len());
        for pix in 0..self.weights.len() {
            let (idx, w, valid) = self.weights.entry(pix);
            if !valid {
                out.push(MISSING);
                continue;
            }
            let sum = w[0] * f64::from(source[idx[0] as usize])
                + w[1] * f64::from(source[idx[1] as usize])
                + w[2] * f64::from(source[idx[2] as usize]);
            out.push(sum as f32);
        }
        Ok(out)
    }

    /// Remap a batch of independent chunks in parallel.
    ///
    /// `load` materializes the source field for one chunk descriptor (a lazy
    /// byte-range read, typically). Chunks share no mutable state and run in
    /// any order; results are returned by position, matching `chunks`. A
    /// chunk descriptor mapped to `None` by the loader (a combination absent
    /// from the source) yields an all-missing field.
    pub fn apply_chunks<T, E, L>(
        &self,
        chunks: &[T],
        load: L,
    ) -> std::result::Result<Vec<Vec<f32>>, E>
    where
        T: Sync,
        E: From<RemapError> + Send,
        L: Fn(&T) -> std::result::Result<Option<Vec<f32>>, E> + Sync,
    {
        chunks
            .par_iter()
            .map(|chunk| match load(chunk)? {
                Some(field) => self.apply_field(&field).map_err(E::from),
                None => Ok(vec![MISSING; self.weights.len()]),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::GridPoints;
    use crate::triangulation::Triangulation;
    use crate::weights::compute_weights;
    use healpix_grid::{HealpixGrid, Ordering};

    fn square_points() -> GridPoints {
        GridPoints::new([(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)])
    }

    /// Hand-checkable scenario: values {1, 2, 3, 1} on the corners of a
    /// 10-degree square; the center query must reproduce the exact
    /// barycentric combination, and a far-away query must come back missing.
    #[test]
    fn square_scenario_matches_hand_computation() {
        let points = square_points();
        let values = [1.0f32, 2.0, 3.0, 1.0];

        let tri = Triangulation::build(&points).unwrap();
        let center = [5.0, 5.0];
        let t = tri.locate(center, 0).expect("center lies inside");
        let (idx, w) = tri.barycentric(t, center);

        for wi in w {
            assert!(wi >= -1e-12 && wi <= 1.0 + 1e-12);
        }

        let got: f64 = idx
            .iter()
            .zip(w.iter())
            .map(|(i, wi)| wi * f64::from(values[*i]))
            .sum();

        // (5,5) lies on whichever diagonal the triangulation picked and
        // averages that diagonal's two corners: (0,0)/(10,10) gives 1,
        // (10,0)/(0,10) gives 2.5. Recompute by hand from the simplex the
        // mesh actually chose.
        let on_main_diagonal = idx.contains(&0) && idx.contains(&3);
        let expected = if on_main_diagonal { 1.0 } else { 2.5 };
        let uses_diagonal: f64 = idx
            .iter()
            .zip(w.iter())
            .filter(|(i, _)| {
                if on_main_diagonal {
                    **i == 0 || **i == 3
                } else {
                    **i == 1 || **i == 2
                }
            })
            .map(|(_, wi)| *wi)
            .sum();
        assert!((uses_diagonal - 1.0).abs() < 1e-9, "mass sits on the diagonal");
        assert!((got - expected).abs() < 1e-9);

        assert!(tri.locate([100.0, 100.0], 0).is_none());
    }

    #[test]
    fn identity_mapping_reproduces_source_values() {
        // Choose source points at the pixel centers themselves; remapping is
        // then the identity up to floating-point noise.
        let grid = HealpixGrid::new(1, Ordering::Nested).unwrap();
        let centers = grid.centers();
        let points = GridPoints::new(centers.iter().copied());
        let set = compute_weights(&points, grid).unwrap();
        let applicator = RemapApplicator::new(&set);

        let source: Vec<f32> = (0..points.len()).map(|i| i as f32 * 0.5 + 1.0).collect();
        let out = applicator.apply_field(&source).unwrap();

        for pix in 0..set.len() {
            if set.is_valid(pix) {
                assert!(
                    (out[pix] - source[pix]).abs() < 1e-4,
                    "pixel {pix}: {} != {}",
                    out[pix],
                    source[pix]
                );
            }
        }
    }

    #[test]
    fn dimension_mismatch_is_caught_before_work() {
        let grid = HealpixGrid::new(1, Ordering::Ring).unwrap();
        let set = compute_weights(&square_points(), grid).unwrap();
        let applicator = RemapApplicator::new(&set);

        let wrong = vec![0.0f32; 7];
        assert!(matches!(
            applicator.apply_field(&wrong),
            Err(RemapError::DimensionMismatch {
                expected: 4,
                actual: 7
            })
        ));
    }

    #[test]
    fn invalid_pixels_get_the_sentinel() {
        let grid = HealpixGrid::new(2, Ordering::Nested).unwrap();
        let set = compute_weights(&square_points(), grid).unwrap();
        let applicator = RemapApplicator::new(&set);

        let out = applicator.apply_field(&[1.0, 2.0, 3.0, 1.0]).unwrap();
        assert!(set.valid_count() < set.len());
        for pix in 0..set.len() {
            if !set.is_valid(pix) {
                assert!(out[pix].is_nan());
            }
        }
    }

    #[test]
    fn chunked_application_matches_unchunked() {
        let grid = HealpixGrid::new(2, Ordering::Ring).unwrap();
        let points = GridPoints::new(
            (0..100).map(|i| (-170.0 + (i % 10) as f64 * 35.0, -80.0 + (i / 10) as f64 * 17.0)),
        );
        let set = compute_weights(&points, grid).unwrap();
        let applicator = RemapApplicator::new(&set);

        let fields: Vec<Vec<f32>> = (0..4)
            .map(|k| (0..100).map(|i| (i * (k + 1)) as f32).collect())
            .collect();

        let serial: Vec<Vec<f32>> = fields
            .iter()
            .map(|f| applicator.apply_field(f).unwrap())
            .collect();

        let keys: Vec<usize> = (0..fields.len()).collect();
        let parallel = applicator
            .apply_chunks(&keys, |&k| Ok::<_, RemapError>(Some(fields[k].clone())))
            .unwrap();

        // Combined by position, not arrival order, and bit-identical.
        for (s, p) in serial.iter().zip(parallel.iter()) {
            for (a, b) in s.iter().zip(p.iter()) {
                assert!(a == b || (a.is_nan() && b.is_nan()));
            }
        }
    }

    #[test]
    fn absent_chunks_become_all_missing() {
        let grid = HealpixGrid::new(1, Ordering::Nested).unwrap();
        let set = compute_weights(&square_points(), grid).unwrap();
        let applicator = RemapApplicator::new(&set);

        let keys = [true, false];
        let out = applicator
            .apply_chunks(&keys, |&present| {
                Ok::<_, RemapError>(present.then(|| vec![1.0f32; 4]))
            })
            .unwrap();
        assert!(out[1].iter().all(|v| v.is_nan()));
    }
}

//! Disk-backed cache for computed weight sets.
//!
//! Triangulating a full model grid dominates the cost of a remap run, while
//! the source geometry changes only when the upstream model changes. Weights
//! are therefore persisted per (geometry fingerprint, zoom, ordering) and
//! reloaded on later runs; a geometry change alters the fingerprint and the
//! stale entry is simply never matched again.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use healpix_grid::HealpixGrid;

use crate::error::Result;
use crate::points::GridPoints;
use crate::weights::{compute_weights, WeightSet};

/// File-backed weight-set cache rooted at a directory.
pub struct WeightCache {
    dir: PathBuf,
}

impl WeightCache {
    /// Open (and create if necessary) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Fetch weights for (points, grid), computing and persisting on a miss.
    ///
    /// A cache file that exists but fails to parse is treated as a miss and
    /// overwritten; a stale or truncated sidecar must never poison a run.
    pub fn get_or_compute(&self, points: &GridPoints, grid: HealpixGrid) -> Result<Arc<WeightSet>> {
        let path = self.entry_path(points, grid);

        if path.exists() {
            match Self::load(&path) {
                Ok(set) if set.source_len() == points.len() => {
                    info!(path = %path.display(), "reusing cached weights");
                    return Ok(Arc::new(set));
                }
                Ok(_) => {
                    warn!(path = %path.display(), "cached weights do not match source length, recomputing");
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unreadable weight cache entry, recomputing");
                }
            }
        }

        let set = compute_weights(points, grid)?;
        self.store(&path, &set)?;
        Ok(Arc::new(set))
    }

    /// Path of the cache entry for (points, grid).
    pub fn entry_path(&self, points: &GridPoints, grid: HealpixGrid) -> PathBuf {
        self.dir.join(format!(
            "weights-{:016x}-z{}-{}.json",
            points.fingerprint(),
            grid.zoom(),
            grid.ordering()
        ))
    }

    fn load(path: &Path) -> Result<WeightSet> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn store(&self, path: &Path, set: &WeightSet) -> Result<()> {
        // Write-then-rename so a crashed run cannot leave a torn entry.
        let tmp = path.with_extension("json.partial");
        fs::write(&tmp, serde_json::to_vec(set)?)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "weights persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healpix_grid::Ordering;

    fn points() -> GridPoints {
        GridPoints::new([(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0), (5.0, 5.0)])
    }

    #[test]
    fn miss_computes_and_hit_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WeightCache::open(dir.path()).unwrap();
        let grid = HealpixGrid::new(1, Ordering::Nested).unwrap();

        let first = cache.get_or_compute(&points(), grid).unwrap();
        let entry = cache.entry_path(&points(), grid);
        assert!(entry.exists());

        let second = cache.get_or_compute(&points(), grid).unwrap();
        assert_eq!(first.len(), second.len());
        for pix in 0..first.len() {
            let (ia, wa, va) = first.entry(pix);
            let (ib, wb, vb) = second.entry(pix);
            assert_eq!(ia, ib);
            assert_eq!(va, vb);
            assert_eq!(wa, wb);
        }
    }

    #[test]
    fn corrupt_entries_are_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WeightCache::open(dir.path()).unwrap();
        let grid = HealpixGrid::new(1, Ordering::Ring).unwrap();

        let entry = cache.entry_path(&points(), grid);
        fs::write(&entry, b"not json").unwrap();

        let set = cache.get_or_compute(&points(), grid).unwrap();
        assert_eq!(set.source_len(), points().len());
        // The poisoned file was replaced with a valid one.
        assert!(WeightCache::load(&entry).is_ok());
    }

    #[test]
    fn distinct_grids_get_distinct_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WeightCache::open(dir.path()).unwrap();
        let nest = HealpixGrid::new(1, Ordering::Nested).unwrap();
        let ring = HealpixGrid::new(1, Ordering::Ring).unwrap();

        assert_ne!(
            cache.entry_path(&points(), nest),
            cache.entry_path(&points(), ring)
        );
    }
}

//! Zarr V3 store writer for remapped datasets.
//!
//! Lays out one store per logical dataset:
//!
//! ```text
//! store/
//!   zarr.json            root group
//!   time/                int64 seconds since epoch, axis T
//!   level/               float64 hPa, axis Z (level-bearing datasets only)
//!   crs/                 scalar carrier of the HEALPix grid mapping
//!   <variable>/          float32 [time, level, cell] or [time, cell]
//! ```
//!
//! Variable data arrives slab by slab along the time axis, so neither the
//! writer nor its caller ever holds a full variable in memory. A slab is
//! stored in whole chunks; an aborted run leaves complete chunks or nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ReadableStorageTraits, WritableStorageTraits};

use healpix_grid::HealpixGrid;
use remap_engine::VariableAttrs;

use crate::config::ZarrSinkConfig;
use crate::error::{Result, SinkError};

/// Totals reported after a dataset is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteSummary {
    pub arrays: usize,
    pub elements_written: u64,
}

/// Writes one logical dataset into a Zarr store.
pub struct DatasetWriter<S> {
    store: Arc<S>,
    grid: HealpixGrid,
    times: Vec<DateTime<Utc>>,
    /// Pressure levels in hPa; empty for single-level datasets.
    levels: Vec<i64>,
    config: ZarrSinkConfig,
    arrays: usize,
    elements_written: u64,
}

impl<S: ReadableStorageTraits + WritableStorageTraits + 'static> DatasetWriter<S> {
    /// Create the store skeleton: root group, coordinate arrays and the
    /// grid-mapping carrier.
    pub fn create(
        store: S,
        grid: HealpixGrid,
        times: Vec<DateTime<Utc>>,
        levels: Vec<i64>,
        config: ZarrSinkConfig,
    ) -> Result<Self> {
        if times.is_empty() {
            return Err(SinkError::InvalidLayout("empty time axis".into()));
        }

        let store = Arc::new(store);
        let mut writer = Self {
            store,
            grid,
            times,
            levels,
            config,
            arrays: 0,
            elements_written: 0,
        };

        let group = GroupBuilder::new()
            .build(writer.store.clone(), "/")
            .map_err(|e| SinkError::Storage(e.to_string()))?;
        group
            .store_metadata()
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        writer.write_time_axis()?;
        if !writer.levels.is_empty() {
            writer.write_level_axis()?;
        }
        writer.write_crs()?;

        info!(
            zoom = grid.zoom(),
            ordering = %grid.ordering(),
            times = writer.times.len(),
            levels = writer.levels.len(),
            "created store skeleton"
        );
        Ok(writer)
    }

    /// Number of fields per time step (levels, or 1 when single-level).
    pub fn fields_per_time(&self) -> usize {
        self.levels.len().max(1)
    }

    /// Pixels per field.
    pub fn npix(&self) -> u64 {
        self.grid.npix()
    }

    /// Configured time-axis chunk extent.
    pub fn time_chunk(&self) -> usize {
        self.config.time_chunk as usize
    }

    /// Create the array for one output variable.
    ///
    /// Shape is `[time, level, cell]` for level-bearing datasets and
    /// `[time, cell]` otherwise; fill value is NaN, matching the remap
    /// engine's missing sentinel. The descriptive attributes are copied
    /// onto the array unchanged.
    pub fn create_variable(&mut self, name: &str, attrs: &VariableAttrs) -> Result<Array<S>> {
        let npix = self.grid.npix();
        let (shape, chunk_shape) = if self.levels.is_empty() {
            (
                vec![self.times.len() as u64, npix],
                vec![self.config.time_chunk, self.config.pixel_chunk.min(npix)],
            )
        } else {
            (
                vec![self.times.len() as u64, self.levels.len() as u64, npix],
                vec![
                    self.config.time_chunk,
                    self.levels.len() as u64,
                    self.config.pixel_chunk.min(npix),
                ],
            )
        };

        let mut attributes = serde_json::Map::new();
        attributes.insert("long_name".into(), serde_json::json!(attrs.long_name));
        attributes.insert(
            "standard_name".into(),
            serde_json::json!(attrs.standard_name),
        );
        attributes.insert("units".into(), serde_json::json!(attrs.units));
        attributes.insert("type".into(), serde_json::json!(attrs.data_type));
        attributes.insert("levtype".into(), serde_json::json!(attrs.level_type));
        attributes.insert("grid_mapping".into(), serde_json::json!("crs"));

        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| SinkError::Storage(format!("{e:?}")))?;

        let mut binding = ArrayBuilder::new(
            shape,
            DataType::Float32,
            chunk_grid,
            FillValue::from(f32::NAN),
        );
        let builder = binding.attributes(attributes);

        let array = builder
            .build(self.store.clone(), &format!("/{name}"))
            .map_err(|e| SinkError::Storage(e.to_string()))?;
        array
            .store_metadata()
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        self.arrays += 1;
        debug!(variable = name, "created variable array");
        Ok(array)
    }

    /// Store a slab of `nt` consecutive time steps starting at `t0`.
    ///
    /// `data` is row-major `[nt, level, cell]` (or `[nt, cell]`), exactly the
    /// concatenation of the remapped fields for those steps. Start the slab
    /// on a multiple of the time chunk so only trailing-edge chunks are ever
    /// partial.
    pub fn write_slab(
        &mut self,
        array: &Array<S>,
        t0: usize,
        nt: usize,
        data: &[f32],
    ) -> Result<()> {
        let npix = self.grid.npix() as usize;
        let expected = nt * self.fields_per_time() * npix;
        if data.len() != expected {
            return Err(SinkError::InvalidLayout(format!(
                "slab of {nt} steps needs {expected} values, got {}",
                data.len()
            )));
        }
        if t0 + nt > self.times.len() {
            return Err(SinkError::InvalidLayout(format!(
                "slab [{t0}, {}) overruns the time axis of {}",
                t0 + nt,
                self.times.len()
            )));
        }

        let subset = if self.levels.is_empty() {
            ArraySubset::new_with_start_shape(
                vec![t0 as u64, 0],
                vec![nt as u64, npix as u64],
            )
        } else {
            ArraySubset::new_with_start_shape(
                vec![t0 as u64, 0, 0],
                vec![nt as u64, self.levels.len() as u64, npix as u64],
            )
        }
        .map_err(|e| SinkError::Storage(e.to_string()))?;

        array
            .store_array_subset_elements(&subset, data)
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        self.elements_written += data.len() as u64;
        Ok(())
    }

    /// Finish writing and report totals.
    pub fn finish(self) -> WriteSummary {
        WriteSummary {
            arrays: self.arrays,
            elements_written: self.elements_written,
        }
    }

    fn write_time_axis(&mut self) -> Result<()> {
        let seconds: Vec<i64> = self.times.iter().map(|t| t.timestamp()).collect();

        let mut attributes = serde_json::Map::new();
        attributes.insert(
            "units".into(),
            serde_json::json!("seconds since 1970-01-01T00:00:00Z"),
        );
        attributes.insert("calendar".into(), serde_json::json!("standard"));
        attributes.insert("axis".into(), serde_json::json!("T"));

        self.write_coord_i64("time", &seconds, attributes)
    }

    fn write_level_axis(&mut self) -> Result<()> {
        let levels: Vec<f64> = self.levels.iter().map(|l| *l as f64).collect();

        let mut attributes = serde_json::Map::new();
        attributes.insert("units".into(), serde_json::json!("hPa"));
        attributes.insert("positive".into(), serde_json::json!("down"));
        attributes.insert("standard_name".into(), serde_json::json!("air_pressure"));
        attributes.insert(
            "long_name".into(),
            serde_json::json!("Air pressure at model level"),
        );
        attributes.insert("axis".into(), serde_json::json!("Z"));

        self.write_coord_f64("level", &levels, attributes)
    }

    /// The grid-mapping carrier: a single-element array whose attributes
    /// describe the target pixelization, attached once per dataset.
    fn write_crs(&mut self) -> Result<()> {
        let mut attributes = serde_json::Map::new();
        attributes.insert("grid_mapping_name".into(), serde_json::json!("healpix"));
        attributes.insert(
            "healpix_nside".into(),
            serde_json::json!(self.grid.nside()),
        );
        attributes.insert(
            "healpix_order".into(),
            serde_json::json!(self.grid.ordering().as_str()),
        );

        self.write_coord_f64("crs", &[f64::NAN], attributes)
    }

    fn write_coord_i64(
        &mut self,
        name: &str,
        values: &[i64],
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let len = values.len() as u64;
        let chunk_grid: zarrs::array::ChunkGrid = vec![len.max(1)]
            .try_into()
            .map_err(|e| SinkError::Storage(format!("{e:?}")))?;

        let mut binding = ArrayBuilder::new(
            vec![len],
            DataType::Int64,
            chunk_grid,
            FillValue::from(0i64),
        );
        let builder = binding.attributes(attributes);
        let array = builder
            .build(self.store.clone(), &format!("/{name}"))
            .map_err(|e| SinkError::Storage(e.to_string()))?;
        array
            .store_metadata()
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        let subset = ArraySubset::new_with_start_shape(vec![0], vec![len])
            .map_err(|e| SinkError::Storage(e.to_string()))?;
        array
            .store_array_subset_elements(&subset, values)
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        self.arrays += 1;
        Ok(())
    }

    fn write_coord_f64(
        &mut self,
        name: &str,
        values: &[f64],
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let len = values.len() as u64;
        let chunk_grid: zarrs::array::ChunkGrid = vec![len.max(1)]
            .try_into()
            .map_err(|e| SinkError::Storage(format!("{e:?}")))?;

        let mut binding = ArrayBuilder::new(
            vec![len],
            DataType::Float64,
            chunk_grid,
            FillValue::from(f64::NAN),
        );
        let builder = binding.attributes(attributes);
        let array = builder
            .build(self.store.clone(), &format!("/{name}"))
            .map_err(|e| SinkError::Storage(e.to_string()))?;
        array
            .store_metadata()
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        let subset = ArraySubset::new_with_start_shape(vec![0], vec![len])
            .map_err(|e| SinkError::Storage(e.to_string()))?;
        array
            .store_array_subset_elements(&subset, values)
            .map_err(|e| SinkError::Storage(e.to_string()))?;

        self.arrays += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use healpix_grid::Ordering;
    use zarrs_filesystem::FilesystemStore;

    fn attrs() -> VariableAttrs {
        VariableAttrs {
            long_name: "Temperature".into(),
            standard_name: "air_temperature".into(),
            units: "K".into(),
            data_type: "forecast".into(),
            level_type: "pl".into(),
        }
    }

    #[test]
    fn writes_and_reopens_a_small_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).unwrap();
        let grid = HealpixGrid::new(0, Ordering::Nested).unwrap();
        let times = vec![
            Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 8, 7, 6, 0, 0).unwrap(),
        ];
        let levels = vec![500, 850];

        let mut writer = DatasetWriter::create(
            store,
            grid,
            times.clone(),
            levels.clone(),
            ZarrSinkConfig {
                time_chunk: 1,
                pixel_chunk: 12,
            },
        )
        .unwrap();

        let array = writer.create_variable("t", &attrs()).unwrap();

        // Two slabs of one time step each: [1, 2 levels, 12 pixels].
        let slab0: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let slab1: Vec<f32> = (0..24).map(|i| (100 + i) as f32).collect();
        writer.write_slab(&array, 0, 1, &slab0).unwrap();
        writer.write_slab(&array, 1, 1, &slab1).unwrap();

        let summary = writer.finish();
        assert_eq!(summary.arrays, 4); // time, level, crs, t
        assert_eq!(summary.elements_written, 48);

        // Reopen through a fresh store handle and verify the data and attrs.
        let store = Arc::new(FilesystemStore::new(dir.path()).unwrap());
        let array = Array::open(store, "/t").unwrap();
        assert_eq!(array.shape(), &[2, 2, 12]);
        assert_eq!(
            array.attributes().get("units"),
            Some(&serde_json::json!("K"))
        );

        let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], vec![2, 2, 12]).unwrap();
        let read: Vec<f32> = array.retrieve_array_subset_elements(&subset).unwrap();
        assert_eq!(&read[..24], &slab0[..]);
        assert_eq!(&read[24..], &slab1[..]);
    }

    #[test]
    fn slab_shape_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).unwrap();
        let grid = HealpixGrid::new(0, Ordering::Ring).unwrap();
        let times = vec![Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap()];

        let mut writer = DatasetWriter::create(
            store,
            grid,
            times,
            Vec::new(),
            ZarrSinkConfig::default(),
        )
        .unwrap();
        let array = writer.create_variable("2t", &attrs()).unwrap();

        let short = vec![0.0f32; 5];
        assert!(matches!(
            writer.write_slab(&array, 0, 1, &short),
            Err(SinkError::InvalidLayout(_))
        ));

        let beyond = vec![0.0f32; 12];
        assert!(matches!(
            writer.write_slab(&array, 1, 1, &beyond),
            Err(SinkError::InvalidLayout(_))
        ));
    }

    #[test]
    fn single_level_datasets_have_two_dimensional_variables() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).unwrap();
        let grid = HealpixGrid::new(0, Ordering::Nested).unwrap();
        let times = vec![Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap()];

        let mut writer = DatasetWriter::create(
            store,
            grid,
            times,
            Vec::new(),
            ZarrSinkConfig {
                time_chunk: 1,
                pixel_chunk: 6,
            },
        )
        .unwrap();
        let array = writer.create_variable("msl", &attrs()).unwrap();
        assert_eq!(array.shape(), &[1, 12]);

        let slab: Vec<f32> = (0..12).map(|i| i as f32).collect();
        writer.write_slab(&array, 0, 1, &slab).unwrap();
        let summary = writer.finish();
        assert_eq!(summary.arrays, 3); // time, crs, msl
    }
}

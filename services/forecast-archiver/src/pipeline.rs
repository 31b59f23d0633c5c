//! Remap-and-store orchestration for merged logical datasets.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use zarrs_filesystem::FilesystemStore;

use grib_index::{decode_field, source_latlons};
use healpix_grid::HealpixGrid;
use remap_engine::{GridPoints, RemapApplicator, VariableAttrs, WeightCache};
use virtual_dataset::{ChunkRef, LogicalDataset};
use zarr_sink::{DatasetWriter, WriteSummary, ZarrSinkConfig};

/// One written store.
#[derive(Debug)]
pub struct StoreResult {
    pub dataset: String,
    pub path: PathBuf,
    pub summary: WriteSummary,
}

/// Remap every dataset of a cycle and write one store per dataset.
///
/// Weight computation is keyed by source geometry and target grid, so
/// datasets sharing a geometry (the usual case: surface and pressure-level
/// files of one feed) triangulate once.
pub fn remap_and_store(
    datasets: &[LogicalDataset],
    grid: HealpixGrid,
    weight_cache: &WeightCache,
    store_dir: &Path,
    cycle_label: &str,
    sink_config: ZarrSinkConfig,
) -> Result<Vec<StoreResult>> {
    std::fs::create_dir_all(store_dir)?;
    let mut results = Vec::new();

    for dataset in datasets {
        let Some(probe) = dataset.any_chunk_ref() else {
            warn!(dataset = %dataset.name, "dataset holds no fields, skipping");
            continue;
        };

        // Source geometry comes from the data itself; every field of the
        // feed shares it.
        let lonlats = source_latlons(&probe.file)
            .with_context(|| format!("reading source grid from {}", probe.file.display()))?;
        let points = GridPoints::new(lonlats);

        let weights = weight_cache.get_or_compute(&points, grid)?;
        let applicator = RemapApplicator::new(&weights);

        // Fail on geometry/field disagreement before any chunk is computed.
        let first_field = decode_field(&probe.file, probe.span)?;
        applicator.check_source_len(first_field.len())?;
        drop(first_field);

        let store_path = store_dir.join(format!("{cycle_label}_{}.zarr", dataset.name));
        let summary = write_dataset(dataset, grid, &applicator, &store_path, sink_config)?;

        info!(
            dataset = %dataset.name,
            store = %store_path.display(),
            arrays = summary.arrays,
            "dataset stored"
        );
        results.push(StoreResult {
            dataset: dataset.name.clone(),
            path: store_path,
            summary,
        });
    }

    Ok(results)
}

fn write_dataset(
    dataset: &LogicalDataset,
    grid: HealpixGrid,
    applicator: &RemapApplicator<'_>,
    store_path: &Path,
    sink_config: ZarrSinkConfig,
) -> Result<WriteSummary> {
    let store = FilesystemStore::new(store_path)
        .map_err(|e| anyhow::anyhow!("opening store {}: {e}", store_path.display()))?;

    let levels: Vec<i64> = if dataset.has_level_axis() {
        dataset.levels().to_vec()
    } else {
        Vec::new()
    };
    let times = dataset.times().to_vec();

    let mut writer = DatasetWriter::create(store, grid, times.clone(), levels.clone(), sink_config)?;
    let fields_per_time = writer.fields_per_time();
    let npix = writer.npix() as usize;
    let time_chunk = writer.time_chunk().max(1);

    for name in dataset.variable_names().map(String::from).collect::<Vec<_>>() {
        let variable = dataset
            .variable(&name)
            .expect("variable names come from the dataset");
        let attrs = variable_attrs(&variable.meta);
        let array = writer.create_variable(&name, &attrs)?;

        // Slabs advance in store-chunk strides so every store key is written
        // exactly once, fully computed. Within a slab the (time, level)
        // fields are independent and run in parallel.
        let mut t0 = 0usize;
        while t0 < times.len() {
            let nt = time_chunk.min(times.len() - t0);

            let jobs: Vec<Option<ChunkRef>> = (t0..t0 + nt)
                .flat_map(|ti| {
                    let time = times[ti];
                    if levels.is_empty() {
                        vec![dataset.chunk_ref(&name, time, 0).cloned()]
                    } else {
                        levels
                            .iter()
                            .map(|level| dataset.chunk_ref(&name, time, *level).cloned())
                            .collect()
                    }
                })
                .collect();

            let fields = applicator.apply_chunks(&jobs, |job| match job {
                Some(chunk) => {
                    let field = decode_field(&chunk.file, chunk.span)
                        .map_err(|e| anyhow::anyhow!("{}: {e}", chunk.file.display()))?;
                    Ok::<_, anyhow::Error>(Some(field))
                }
                None => Ok(None),
            })?;

            let mut slab = Vec::with_capacity(nt * fields_per_time * npix);
            for field in fields {
                slab.extend_from_slice(&field);
            }
            writer.write_slab(&array, t0, nt, &slab)?;

            t0 += nt;
        }
    }

    Ok(writer.finish())
}

/// Output attributes, copied field for field from the source metadata.
fn variable_attrs(meta: &virtual_dataset::VariableMeta) -> VariableAttrs {
    VariableAttrs {
        long_name: meta.long_name.clone(),
        standard_name: meta.standard_name.clone(),
        units: meta.units.clone(),
        data_type: if meta.data_type == "fc" {
            "forecast".to_string()
        } else {
            "analysis".to_string()
        },
        level_type: meta.levtype.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_metadata_maps_onto_output_attrs() {
        let meta = virtual_dataset::VariableMeta {
            long_name: "Temperature".into(),
            standard_name: "air_temperature".into(),
            units: "K".into(),
            data_type: "fc".into(),
            levtype: "pl".into(),
        };
        let attrs = variable_attrs(&meta);
        assert_eq!(attrs.long_name, "Temperature");
        assert_eq!(attrs.data_type, "forecast");
        assert_eq!(attrs.level_type, "pl");

        let analysis = virtual_dataset::VariableMeta {
            data_type: "an".into(),
            ..meta
        };
        assert_eq!(variable_attrs(&analysis).data_type, "analysis");
    }
}

//! Index merging.
//!
//! Combines many per-file indices into one logical dataset per level family.
//! The merge is a deterministic sort/dedup pass: input order defines the
//! first-seen policy for duplicate fields, axes come out sorted, and running
//! the same merge twice yields byte-identical datasets.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use grib_index::{FileIndex, LevelFamily};

use crate::logical::{ChunkRef, LogicalDataset, LogicalVariable, VariableMeta};

/// Outcome of a merge: the assembled datasets plus a diagnostic report.
#[derive(Debug)]
pub struct MergeOutcome {
    /// One dataset per level family present in the input, sorted by name.
    pub datasets: Vec<LogicalDataset>,
    pub report: MergeReport,
}

/// What happened during a merge.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Files whose entries contributed to the datasets.
    pub files_merged: usize,
    /// Files excluded because their index was missing or malformed.
    pub excluded: Vec<ExcludedFile>,
    /// Duplicate (variable, time, level) entries discarded (first seen kept).
    pub duplicates_dropped: usize,
}

/// Diagnostic record for one excluded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedFile {
    pub file: PathBuf,
    pub reason: String,
}

/// Merge indices read from sidecar files.
///
/// A sidecar that cannot be read or parsed excludes only that file: the
/// failure is recorded in the report, logged, and the merge continues with
/// the remaining inputs.
pub fn merge_sidecars(sidecars: &[PathBuf]) -> MergeOutcome {
    let mut indices = Vec::with_capacity(sidecars.len());
    let mut excluded = Vec::new();

    for path in sidecars {
        match FileIndex::read_sidecar(path) {
            Ok(index) => indices.push(index),
            Err(err) => {
                warn!(file = %path.display(), error = %err, "excluding file from merge");
                excluded.push(ExcludedFile {
                    file: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    let mut outcome = merge_indices(indices);
    outcome.report.excluded.extend(excluded);
    outcome
}

/// Merge already-loaded indices.
pub fn merge_indices(indices: Vec<FileIndex>) -> MergeOutcome {
    // Gather per-family axes and variables in one pass over the input order.
    let mut times: BTreeMap<&'static str, BTreeSet<chrono::DateTime<chrono::Utc>>> =
        BTreeMap::new();
    let mut levels: BTreeMap<&'static str, BTreeSet<i64>> = BTreeMap::new();
    let mut variables: BTreeMap<&'static str, BTreeMap<String, LogicalVariable>> = BTreeMap::new();
    let mut duplicates_dropped = 0usize;

    let files_merged = indices.len();
    for index in &indices {
        for entry in &index.entries {
            let family = if entry.levtype == LevelFamily::PressureLevel.as_str() {
                LevelFamily::PressureLevel.as_str()
            } else {
                LevelFamily::Surface.as_str()
            };

            times.entry(family).or_default().insert(entry.valid_time);
            levels.entry(family).or_default().insert(entry.level);

            let var = variables
                .entry(family)
                .or_default()
                .entry(entry.param.clone())
                .or_insert_with(|| {
                    LogicalVariable::new(VariableMeta {
                        long_name: entry.long_name.clone(),
                        standard_name: entry.standard_name.clone(),
                        units: entry.units.clone(),
                        data_type: entry.data_type.clone(),
                        levtype: entry.levtype.clone(),
                    })
                });

            let kept = var.insert_first_seen(
                (entry.valid_time, entry.level),
                ChunkRef {
                    file: index.file.clone(),
                    span: entry.span,
                },
            );
            if !kept {
                duplicates_dropped += 1;
            }
        }
    }

    let datasets: Vec<LogicalDataset> = variables
        .into_iter()
        .map(|(family, vars)| {
            LogicalDataset::new(
                family.to_string(),
                times.remove(family).unwrap_or_default().into_iter().collect(),
                levels
                    .remove(family)
                    .unwrap_or_default()
                    .into_iter()
                    .collect(),
                vars,
            )
        })
        .collect();

    for ds in &datasets {
        info!(
            dataset = %ds.name,
            variables = ds.num_variables(),
            times = ds.times().len(),
            levels = ds.levels().len(),
            "assembled logical dataset"
        );
    }

    MergeOutcome {
        datasets,
        report: MergeReport {
            files_merged,
            excluded: Vec::new(),
            duplicates_dropped,
        },
    }
}

/// Merge every `.index` sidecar found directly under a directory.
///
/// Paths are sorted before merging so the first-seen policy does not depend
/// on filesystem enumeration order.
pub fn merge_directory(dir: impl AsRef<Path>) -> std::io::Result<MergeOutcome> {
    let mut sidecars: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "index"))
        .collect();
    sidecars.sort();
    Ok(merge_sidecars(&sidecars))
}

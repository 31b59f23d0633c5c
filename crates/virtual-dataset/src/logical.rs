//! Logical datasets: merged views over unmodified source files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use grib_index::MessageSpan;

use crate::error::Result;

/// Deferred read description: where one horizontal field lives.
///
/// Nothing is read until a consumer resolves the reference, so a logical
/// dataset over hundreds of files costs only its coordinate metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub file: PathBuf,
    pub span: MessageSpan,
}

/// Descriptive metadata of one variable, copied from its source index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMeta {
    pub long_name: String,
    pub standard_name: String,
    pub units: String,
    /// "fc" or "an".
    pub data_type: String,
    /// "pl" or "sfc".
    pub levtype: String,
}

/// Key of one field within a variable: (valid time, level).
pub type FieldKey = (DateTime<Utc>, i64);

/// One variable of a logical dataset: metadata plus its addressable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalVariable {
    pub meta: VariableMeta,
    /// Field locations keyed by (valid time, level). Ordered, so iteration
    /// and serialization are deterministic. JSON carries this as a sorted
    /// list of (key, chunk) pairs since JSON object keys must be strings.
    #[serde(with = "chunk_table")]
    chunks: BTreeMap<FieldKey, ChunkRef>,
}

mod chunk_table {
    use super::{ChunkRef, FieldKey};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<FieldKey, ChunkRef>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let rows: Vec<(&FieldKey, &ChunkRef)> = map.iter().collect();
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<FieldKey, ChunkRef>, D::Error> {
        let rows: Vec<(FieldKey, ChunkRef)> = Vec::deserialize(deserializer)?;
        Ok(rows.into_iter().collect())
    }
}

impl LogicalVariable {
    pub fn new(meta: VariableMeta) -> Self {
        Self {
            meta,
            chunks: BTreeMap::new(),
        }
    }

    /// Record a field location; first-seen wins. Returns `false` when the
    /// key was already present (a duplicate).
    pub fn insert_first_seen(&mut self, key: FieldKey, chunk: ChunkRef) -> bool {
        use std::collections::btree_map::Entry;
        match self.chunks.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(chunk);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Deferred read description for one (time, level), if indexed.
    pub fn chunk_ref(&self, time: DateTime<Utc>, level: i64) -> Option<&ChunkRef> {
        self.chunks.get(&(time, level))
    }

    /// Number of addressable fields.
    pub fn num_fields(&self) -> usize {
        self.chunks.len()
    }

    /// All field keys, ascending.
    pub fn field_keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.chunks.keys()
    }
}

/// A merged, read-only view over many per-file indices.
///
/// Coordinate axes are the sorted, deduplicated union across all
/// contributing files; a variable holds chunk references only for the
/// (time, level) combinations actually indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalDataset {
    /// Group name, e.g. "pl" or "sfc".
    pub name: String,
    times: Vec<DateTime<Utc>>,
    levels: Vec<i64>,
    variables: BTreeMap<String, LogicalVariable>,
}

impl LogicalDataset {
    pub(crate) fn new(
        name: String,
        times: Vec<DateTime<Utc>>,
        levels: Vec<i64>,
        variables: BTreeMap<String, LogicalVariable>,
    ) -> Self {
        Self {
            name,
            times,
            levels,
            variables,
        }
    }

    /// Sorted, deduplicated valid-time axis.
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    /// Sorted, deduplicated level axis (hPa); `[0]` for single-level groups.
    pub fn levels(&self) -> &[i64] {
        &self.levels
    }

    /// Whether the dataset carries a real vertical axis.
    pub fn has_level_axis(&self) -> bool {
        self.levels.len() > 1 || self.levels.first().is_some_and(|l| *l != 0)
    }

    /// Variable names, ascending.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn variable(&self, name: &str) -> Option<&LogicalVariable> {
        self.variables.get(name)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Deferred read description for one (variable, time, level).
    pub fn chunk_ref(&self, var: &str, time: DateTime<Utc>, level: i64) -> Option<&ChunkRef> {
        self.variables.get(var)?.chunk_ref(time, level)
    }

    /// Any one chunk reference, used to probe the shared source geometry.
    pub fn any_chunk_ref(&self) -> Option<&ChunkRef> {
        self.variables
            .values()
            .flat_map(|v| v.chunks.values())
            .next()
    }

    /// Persist the merged view so it can be reopened without re-deriving it
    /// from the per-file indices.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_vec(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Reopen a persisted view.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta() -> VariableMeta {
        VariableMeta {
            long_name: "Temperature".into(),
            standard_name: "air_temperature".into(),
            units: "K".into(),
            data_type: "fc".into(),
            levtype: "pl".into(),
        }
    }

    fn chunk(offset: u64) -> ChunkRef {
        ChunkRef {
            file: PathBuf::from("a.grib2"),
            span: MessageSpan { offset, length: 64 },
        }
    }

    #[test]
    fn first_seen_insertion_keeps_the_original() {
        let t = Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap();
        let mut var = LogicalVariable::new(meta());

        assert!(var.insert_first_seen((t, 500), chunk(0)));
        assert!(!var.insert_first_seen((t, 500), chunk(999)));
        assert_eq!(var.chunk_ref(t, 500), Some(&chunk(0)));
        assert_eq!(var.num_fields(), 1);
    }

    #[test]
    fn dataset_round_trips_through_json() {
        let t = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let mut var = LogicalVariable::new(meta());
        var.insert_first_seen((t, 850), chunk(128));

        let mut variables = BTreeMap::new();
        variables.insert("t".to_string(), var);
        let ds = LogicalDataset::new("pl".into(), vec![t], vec![850], variables);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pl.json");
        ds.to_json_file(&path).unwrap();
        let reopened = LogicalDataset::from_json_file(&path).unwrap();
        assert_eq!(ds, reopened);
    }

    #[test]
    fn level_axis_detection() {
        let ds = LogicalDataset::new("sfc".into(), vec![], vec![0], BTreeMap::new());
        assert!(!ds.has_level_axis());
        let ds = LogicalDataset::new("pl".into(), vec![], vec![500, 850], BTreeMap::new());
        assert!(ds.has_level_axis());
    }
}

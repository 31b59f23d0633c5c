//! Per-file variable indices and their sidecar persistence.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{IndexError, Result};
use crate::scan::{parse_header, scan_messages, MessageSpan};
use crate::tables::{param_info, LevelFamily};

/// Sidecar format version; bumped on incompatible layout changes.
const SIDECAR_VERSION: u32 = 1;

/// One indexed field: where a (variable, level, time) payload lives inside a
/// source file, plus the descriptive metadata carried to the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Short parameter name, e.g. "t" or "10u".
    pub param: String,
    pub long_name: String,
    pub standard_name: String,
    pub units: String,
    /// Level family, "pl" or "sfc".
    pub levtype: String,
    /// Pressure level in hPa for "pl", 0 for "sfc".
    pub level: i64,
    pub reference_time: DateTime<Utc>,
    pub forecast_hours: u32,
    /// Reference time plus lead time; the coordinate the time axis is built
    /// from.
    pub valid_time: DateTime<Utc>,
    /// "fc" or "an" (code table 1.4 condensed).
    pub data_type: String,
    /// Payload location within the file.
    pub span: MessageSpan,
}

/// The structural index of one GRIB2 file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIndex {
    /// The indexed GRIB2 file.
    pub file: PathBuf,
    pub entries: Vec<IndexEntry>,
}

/// Header line of a sidecar file.
#[derive(Debug, Serialize, Deserialize)]
struct SidecarHeader {
    version: u32,
    file: PathBuf,
    messages: usize,
}

impl FileIndex {
    /// Index a GRIB2 file without decoding any payloads.
    pub fn build(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let spans = scan_messages(&data)?;

        let mut entries = Vec::with_capacity(spans.len());
        for span in spans {
            let message = &data[span.offset as usize..(span.offset + span.length) as usize];
            let header = parse_header(message)?;

            let family = LevelFamily::from_surface_type(header.level_type);
            let info = param_info(
                header.discipline,
                header.parameter_category,
                header.parameter_number,
                header.level_type,
                header.level_value,
            );
            let level = match family {
                // Isobaric surfaces carry Pa; the level axis uses hPa.
                LevelFamily::PressureLevel => (header.level_value / 100.0).round() as i64,
                LevelFamily::Surface => 0,
            };

            entries.push(IndexEntry {
                param: info.short_name,
                long_name: info.long_name,
                standard_name: info.standard_name,
                units: info.units,
                levtype: family.as_str().to_string(),
                level,
                reference_time: header.reference_time,
                forecast_hours: header.forecast_hours,
                valid_time: header.reference_time
                    + Duration::hours(i64::from(header.forecast_hours)),
                data_type: if header.processed_data_type == 0 {
                    "an".to_string()
                } else {
                    "fc".to_string()
                },
                span,
            });
        }

        info!(
            file = %path.display(),
            messages = entries.len(),
            "indexed GRIB2 file"
        );
        Ok(Self {
            file: path.to_path_buf(),
            entries,
        })
    }

    /// Conventional sidecar path for a GRIB2 file: `<path>.index`.
    pub fn sidecar_path(grib_path: &Path) -> PathBuf {
        let mut os = grib_path.as_os_str().to_owned();
        os.push(".index");
        PathBuf::from(os)
    }

    /// Persist the index as a JSON-lines sidecar next to the data file.
    pub fn write_sidecar(&self) -> Result<PathBuf> {
        let path = Self::sidecar_path(&self.file);
        let mut out = Vec::new();

        let header = SidecarHeader {
            version: SIDECAR_VERSION,
            file: self.file.clone(),
            messages: self.entries.len(),
        };
        serde_json::to_writer(&mut out, &header)?;
        out.push(b'\n');
        for entry in &self.entries {
            serde_json::to_writer(&mut out, entry)?;
            out.push(b'\n');
        }

        let mut fp = fs::File::create(&path)?;
        fp.write_all(&out)?;
        debug!(path = %path.display(), "wrote index sidecar");
        Ok(path)
    }

    /// Reopen an index from its sidecar.
    ///
    /// Any structural problem (bad JSON, version skew, entry-count mismatch)
    /// comes back as [`IndexError::Malformed`] so the merge layer can exclude
    /// the file and continue.
    pub fn read_sidecar(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(fs::File::open(path)?);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| IndexError::Malformed("empty sidecar".into()))??;
        let header: SidecarHeader = serde_json::from_str(&header_line)?;
        if header.version != SIDECAR_VERSION {
            return Err(IndexError::Malformed(format!(
                "sidecar version {} unsupported (expected {SIDECAR_VERSION})",
                header.version
            )));
        }

        let mut entries = Vec::with_capacity(header.messages);
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        if entries.len() != header.messages {
            return Err(IndexError::Malformed(format!(
                "sidecar declares {} messages but carries {}",
                header.messages,
                entries.len()
            )));
        }

        Ok(Self {
            file: header.file,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testdata::synthetic_message;

    fn write_synthetic_file(dir: &Path) -> PathBuf {
        let mut bytes = synthetic_message(0, 0, 0, 0, 1, 0, (2026, 8, 7, 0));
        bytes.extend_from_slice(&synthetic_message(0, 2, 2, 6, 100, 85_000, (2026, 8, 7, 0)));
        let path = dir.join("run.grib2");
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn builds_entries_with_derived_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_synthetic_file(dir.path());

        let index = FileIndex::build(&path).unwrap();
        assert_eq!(index.entries.len(), 2);

        let sfc = &index.entries[0];
        assert_eq!(sfc.param, "t");
        assert_eq!(sfc.levtype, "sfc");
        assert_eq!(sfc.data_type, "an");
        assert_eq!(sfc.valid_time, sfc.reference_time);

        let pl = &index.entries[1];
        assert_eq!(pl.param, "u");
        assert_eq!(pl.levtype, "pl");
        assert_eq!(pl.level, 850);
        assert_eq!(pl.data_type, "fc");
        assert_eq!(
            pl.valid_time,
            pl.reference_time + Duration::hours(6)
        );
        assert!(pl.span.offset > 0);
    }

    #[test]
    fn sidecar_reopens_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_synthetic_file(dir.path());

        let index = FileIndex::build(&path).unwrap();
        let sidecar = index.write_sidecar().unwrap();
        assert_eq!(sidecar, FileIndex::sidecar_path(&path));

        let reopened = FileIndex::read_sidecar(&sidecar).unwrap();
        assert_eq!(index, reopened);
    }

    #[test]
    fn malformed_sidecars_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.grib2.index");

        fs::write(&path, b"this is not json\n").unwrap();
        assert!(matches!(
            FileIndex::read_sidecar(&path),
            Err(IndexError::Malformed(_))
        ));

        // Entry count disagreeing with the header is structural corruption.
        let header = r#"{"version":1,"file":"x.grib2","messages":3}"#;
        fs::write(&path, format!("{header}\n")).unwrap();
        assert!(matches!(
            FileIndex::read_sidecar(&path),
            Err(IndexError::Malformed(_))
        ));
    }
}

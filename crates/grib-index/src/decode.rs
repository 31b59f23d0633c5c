//! Lazy payload decoding.
//!
//! The index never materializes data; this module resolves one
//! [`MessageSpan`] at a time into decoded values when the remap stage
//! actually consumes a chunk.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::error::{IndexError, Result};
use crate::scan::MessageSpan;

/// Read and decode the field stored in one message.
///
/// Only `span.length` bytes are read from the file, so fields can be pulled
/// out of arbitrarily large inputs without touching the rest.
pub fn decode_field(path: impl AsRef<Path>, span: MessageSpan) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let mut fp = File::open(path)?;
    fp.seek(SeekFrom::Start(span.offset))?;
    let mut bytes = vec![0u8; span.length as usize];
    fp.read_exact(&mut bytes)?;

    let values = decode_message(&bytes)?;
    debug!(
        file = %path.display(),
        offset = span.offset,
        values = values.len(),
        "decoded field"
    );
    Ok(values)
}

/// Decode the values of a single in-memory GRIB2 message.
pub fn decode_message(bytes: &[u8]) -> Result<Vec<f32>> {
    let grib2 = grib::from_reader(Cursor::new(bytes))
        .map_err(|e| IndexError::Decode(e.to_string()))?;

    let (_, submessage) = grib2
        .iter()
        .next()
        .ok_or_else(|| IndexError::Decode("message contains no submessage".into()))?;

    let decoder = grib::Grib2SubmessageDecoder::from(submessage)
        .map_err(|e| IndexError::Decode(e.to_string()))?;
    let values = decoder
        .dispatch()
        .map_err(|e| IndexError::Decode(e.to_string()))?;

    Ok(values.collect())
}

/// Grid-cell coordinates of the first message in a file, as (lon, lat)
/// pairs in source storage order.
///
/// All horizontal slices of one feed share a geometry, so the first message
/// is representative; the remap layer cross-checks the point count against
/// every decoded field anyway.
pub fn source_latlons(path: impl AsRef<Path>) -> Result<Vec<(f64, f64)>> {
    let path = path.as_ref();
    let fp = BufReader::new(File::open(path)?);
    let grib2 = grib::from_reader(fp).map_err(|e| IndexError::Decode(e.to_string()))?;

    let (_, submessage) = grib2
        .iter()
        .next()
        .ok_or_else(|| IndexError::Decode("file contains no submessage".into()))?;

    let latlons = submessage
        .latlons()
        .map_err(|e| IndexError::Decode(e.to_string()))?;

    Ok(latlons
        .map(|(lat, lon)| (f64::from(lon), f64::from(lat)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_bytes_error_cleanly() {
        assert!(matches!(
            decode_message(b"definitely not grib"),
            Err(IndexError::Decode(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = decode_field(
            "/nonexistent/run.grib2",
            MessageSpan {
                offset: 0,
                length: 16,
            },
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::FileRead(_)));
    }
}

//! Structural scan of GRIB2 files.
//!
//! Walks the message framing (section 0 indicator through the `7777`
//! trailer) and pulls the handful of header fields the index needs out of
//! sections 1 and 4 directly. Payload sections are never touched here; value
//! decoding happens lazily in [`crate::decode`] when a chunk is consumed.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{IndexError, Result};

/// Byte range of one GRIB2 message within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MessageSpan {
    pub offset: u64,
    pub length: u64,
}

/// Header fields extracted from one message without decoding its payload.
#[derive(Debug, Clone)]
pub struct MessageHeader {
    pub discipline: u8,
    pub reference_time: DateTime<Utc>,
    /// 0 = analysis, 1/2 = forecast (code table 1.4).
    pub processed_data_type: u8,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub forecast_hours: u32,
    /// Type of first fixed surface (code table 4.5).
    pub level_type: u8,
    /// First fixed surface value with its scale factor applied.
    pub level_value: f64,
}

/// Locate every GRIB2 message in a file's bytes.
///
/// Fails with [`IndexError::Malformed`] on bad magic, a non-2 edition, a
/// length running past the file, or a missing `7777` trailer; a trailing
/// garbage region after the last complete message is likewise rejected so a
/// truncated download never yields a silently short index.
pub fn scan_messages(data: &[u8]) -> Result<Vec<MessageSpan>> {
    let mut spans = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < 16 {
            return Err(IndexError::Malformed(format!(
                "{} trailing bytes are too short for an indicator section",
                rest.len()
            )));
        }
        if &rest[0..4] != b"GRIB" {
            return Err(IndexError::Malformed(format!(
                "missing GRIB magic at offset {offset}"
            )));
        }
        let edition = rest[7];
        if edition != 2 {
            return Err(IndexError::Malformed(format!(
                "unsupported GRIB edition {edition} at offset {offset}"
            )));
        }

        let length = u64::from_be_bytes([
            rest[8], rest[9], rest[10], rest[11], rest[12], rest[13], rest[14], rest[15],
        ]) as usize;
        if length < 20 || offset + length > data.len() {
            return Err(IndexError::Malformed(format!(
                "message at offset {offset} declares {length} bytes, file has {}",
                data.len() - offset
            )));
        }
        if &data[offset + length - 4..offset + length] != b"7777" {
            return Err(IndexError::Malformed(format!(
                "message at offset {offset} lacks the 7777 trailer"
            )));
        }

        spans.push(MessageSpan {
            offset: offset as u64,
            length: length as u64,
        });
        offset += length;
    }

    Ok(spans)
}

/// Parse the indexed header fields of one message.
pub fn parse_header(message: &[u8]) -> Result<MessageHeader> {
    if message.len() < 16 {
        return Err(IndexError::Malformed("message shorter than section 0".into()));
    }
    let discipline = message[6];

    let sec1 = section(message, 1)?;
    if sec1.len() < 21 {
        return Err(IndexError::Malformed("identification section too short".into()));
    }
    let year = u16::from_be_bytes([sec1[12], sec1[13]]);
    let reference_time = NaiveDate::from_ymd_opt(year as i32, sec1[14] as u32, sec1[15] as u32)
        .and_then(|date| date.and_hms_opt(sec1[16] as u32, sec1[17] as u32, sec1[18] as u32))
        .ok_or_else(|| {
            IndexError::Malformed(format!(
                "invalid reference time {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, sec1[14], sec1[15], sec1[16], sec1[17], sec1[18]
            ))
        })?;
    let reference_time = DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc);
    let processed_data_type = sec1.get(20).copied().unwrap_or(0);

    let sec4 = section(message, 4)?;
    if sec4.len() < 28 {
        return Err(IndexError::Malformed("product definition section too short".into()));
    }
    // Templates 4.0/4.1/4.8/4.11 share this leading layout.
    let parameter_category = sec4[9];
    let parameter_number = sec4[10];
    let time_unit = sec4[17];
    let raw_forecast = u32::from_be_bytes([sec4[18], sec4[19], sec4[20], sec4[21]]);
    let forecast_hours = match time_unit {
        0 => raw_forecast / 60, // minutes
        1 => raw_forecast,      // hours
        2 => raw_forecast * 24, // days
        other => {
            return Err(IndexError::Malformed(format!(
                "unsupported forecast time unit {other}"
            )))
        }
    };

    let level_type = sec4[22];
    let scale_factor = sec4[23] as i8;
    let scaled_value = u32::from_be_bytes([sec4[24], sec4[25], sec4[26], sec4[27]]);
    let level_value = f64::from(scaled_value) / 10f64.powi(i32::from(scale_factor));

    Ok(MessageHeader {
        discipline,
        reference_time,
        processed_data_type,
        parameter_category,
        parameter_number,
        forecast_hours,
        level_type,
        level_value,
    })
}

/// Find a numbered section inside one message, returning its bytes.
fn section(message: &[u8], wanted: u8) -> Result<&[u8]> {
    let mut offset = 16;

    while offset + 5 <= message.len() {
        let length = u32::from_be_bytes([
            message[offset],
            message[offset + 1],
            message[offset + 2],
            message[offset + 3],
        ]) as usize;
        let number = message[offset + 4];

        // "7777" reads as an implausible length; stop at the trailer.
        if number == 8 || length < 5 || offset + length > message.len() {
            break;
        }
        if number == wanted {
            return Ok(&message[offset..offset + length]);
        }
        offset += length;
    }

    Err(IndexError::Malformed(format!("section {wanted} not found")))
}

#[cfg(test)]
pub(crate) mod testdata {
    use super::*;

    /// Assemble a minimal, structurally valid GRIB2 message with the given
    /// header fields and an empty payload. Good enough for framing and
    /// header tests; not decodable.
    pub fn synthetic_message(
        discipline: u8,
        category: u8,
        number: u8,
        forecast_hours: u32,
        level_type: u8,
        scaled_value: u32,
        reference: (u16, u8, u8, u8),
    ) -> Vec<u8> {
        let mut sec1 = vec![0u8; 21];
        sec1[4] = 1;
        sec1[12..14].copy_from_slice(&reference.0.to_be_bytes());
        sec1[14] = reference.1;
        sec1[15] = reference.2;
        sec1[16] = reference.3;
        sec1[20] = if forecast_hours > 0 { 1 } else { 0 };
        let len1 = sec1.len() as u32;
        sec1[0..4].copy_from_slice(&len1.to_be_bytes());

        let mut sec4 = vec![0u8; 34];
        sec4[4] = 4;
        sec4[9] = category;
        sec4[10] = number;
        sec4[17] = 1; // hours
        sec4[18..22].copy_from_slice(&forecast_hours.to_be_bytes());
        sec4[22] = level_type;
        sec4[23] = 0;
        sec4[24..28].copy_from_slice(&scaled_value.to_be_bytes());
        let len4 = sec4.len() as u32;
        sec4[0..4].copy_from_slice(&len4.to_be_bytes());

        let total = 16 + sec1.len() + sec4.len() + 4;
        let mut msg = Vec::with_capacity(total);
        msg.extend_from_slice(b"GRIB");
        msg.extend_from_slice(&[0, 0]);
        msg.push(discipline);
        msg.push(2);
        msg.extend_from_slice(&(total as u64).to_be_bytes());
        msg.extend_from_slice(&sec1);
        msg.extend_from_slice(&sec4);
        msg.extend_from_slice(b"7777");
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::testdata::synthetic_message;
    use super::*;

    #[test]
    fn scans_consecutive_messages() {
        let a = synthetic_message(0, 0, 0, 0, 1, 0, (2026, 8, 1, 0));
        let b = synthetic_message(0, 2, 2, 3, 100, 850_00, (2026, 8, 1, 0));
        let mut file = a.clone();
        file.extend_from_slice(&b);

        let spans = scan_messages(&file).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].offset, 0);
        assert_eq!(spans[0].length, a.len() as u64);
        assert_eq!(spans[1].offset, a.len() as u64);
        assert_eq!(spans[1].length, b.len() as u64);
    }

    #[test]
    fn rejects_truncated_and_garbled_files() {
        let msg = synthetic_message(0, 0, 0, 0, 1, 0, (2026, 8, 1, 0));

        let truncated = &msg[..msg.len() - 6];
        assert!(matches!(
            scan_messages(truncated),
            Err(IndexError::Malformed(_))
        ));

        let mut garbled = msg.clone();
        garbled[0] = b'X';
        assert!(matches!(
            scan_messages(&garbled),
            Err(IndexError::Malformed(_))
        ));

        let mut edition1 = msg;
        edition1[7] = 1;
        assert!(matches!(
            scan_messages(&edition1),
            Err(IndexError::Malformed(_))
        ));
    }

    #[test]
    fn header_fields_round_trip() {
        let msg = synthetic_message(0, 2, 3, 12, 100, 500_00, (2026, 8, 7, 12));
        let header = parse_header(&msg).unwrap();

        assert_eq!(header.discipline, 0);
        assert_eq!(header.parameter_category, 2);
        assert_eq!(header.parameter_number, 3);
        assert_eq!(header.forecast_hours, 12);
        assert_eq!(header.level_type, 100);
        assert!((header.level_value - 50_000.0).abs() < 1e-9);
        assert_eq!(header.processed_data_type, 1);
        assert_eq!(
            header.reference_time,
            DateTime::parse_from_rfc3339("2026-08-07T12:00:00Z").unwrap()
        );
    }
}

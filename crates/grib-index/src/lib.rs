//! Structural GRIB2 indexing.
//!
//! Builds a byte-range index over per-variable GRIB2 files without decoding
//! their payloads: each message's location, parameter identity, level and
//! timestamps are extracted from the section headers alone. Indices persist
//! as JSON-lines `.index` sidecars next to the data files, and payloads are
//! decoded lazily, one message at a time, only when a downstream consumer
//! asks for a field.
//!
//! The split keeps the acquisition side cheap (indexing a multi-hundred-MB
//! file touches a few KB of headers) while the merge/remap side gets exact
//! (variable, level, time) to (file, offset, length) addressing.

pub mod decode;
pub mod error;
mod index;
pub mod scan;
pub mod tables;

pub use decode::{decode_field, decode_message, source_latlons};
pub use error::{IndexError, Result};
pub use index::{FileIndex, IndexEntry};
pub use scan::{parse_header, scan_messages, MessageHeader, MessageSpan};
pub use tables::{param_info, LevelFamily, ParamInfo};

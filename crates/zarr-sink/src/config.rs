//! Sink configuration.

use serde::{Deserialize, Serialize};

/// Storage chunking for the output arrays.
///
/// Independent of how the remap stage slices its work: these sizes shape the
/// store keys on disk, nothing else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZarrSinkConfig {
    /// Chunk extent along the time axis.
    pub time_chunk: u64,
    /// Chunk extent along the target-pixel axis.
    pub pixel_chunk: u64,
}

impl Default for ZarrSinkConfig {
    fn default() -> Self {
        Self {
            time_chunk: 6,
            // One base-resolution face worth of zoom-7 pixels.
            pixel_chunk: 4u64.pow(7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chunking() {
        let config = ZarrSinkConfig::default();
        assert_eq!(config.time_chunk, 6);
        assert_eq!(config.pixel_chunk, 16384);
    }
}

//! Compression parameters for column chunks.
//!
//! Chunk payloads are Arrow IPC bytes run through the configured codec.
//! Parameters are explicit and travel with the column: there is no process
//! global to mutate, and a persisted column records the params it was built
//! with in its metadata.
//!
//! # Example
//!
//! ```rust
//! use silo_core::storage::{Codec, CompressionParams};
//!
//! // Default: zstd level 5
//! let params = CompressionParams::default();
//! assert_eq!(params.codec(), Codec::Zstd);
//!
//! // Store chunks uncompressed
//! let params = CompressionParams::none();
//!
//! // Heavier compression for archival data
//! let params = CompressionParams::zstd_level(19);
//! ```

use crate::error::SiloResult;
use parquet::basic::Compression;
use serde::{Deserialize, Serialize};

/// Chunk payload codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    /// No compression — chunk files hold raw IPC bytes.
    None,
    /// Zstandard with a configurable level (1-22).
    Zstd,
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

/// Compression parameters for a column's chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionParams {
    codec: Codec,
    /// Compression level; only zstd reads it. Clamped to 1-22.
    level: i32,
}

impl Default for CompressionParams {
    /// Default compression: zstd level 5, favoring ratio slightly over raw
    /// speed. Analytical scans decode whole chunks, so the ratio usually wins.
    fn default() -> Self {
        Self {
            codec: Codec::Zstd,
            level: 5,
        }
    }
}

impl CompressionParams {
    pub const DEFAULT_LEVEL: i32 = 5;

    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            level: Self::DEFAULT_LEVEL,
        }
    }

    /// Set the compression level (zstd only; clamped to 1-22).
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level.clamp(1, 22);
        self
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Preset: no compression.
    pub fn none() -> Self {
        Self::new(Codec::None)
    }

    /// Preset: zstd at the default level.
    pub fn zstd() -> Self {
        Self::new(Codec::Zstd)
    }

    /// Preset: zstd at a specific level (1-22).
    pub fn zstd_level(level: i32) -> Self {
        Self::new(Codec::Zstd).with_level(level)
    }

    /// Compress a chunk payload.
    pub fn compress(&self, data: &[u8]) -> SiloResult<Vec<u8>> {
        match self.codec {
            Codec::None => Ok(data.to_vec()),
            Codec::Zstd => Ok(zstd::encode_all(data, self.level)?),
        }
    }

    /// Decompress a chunk payload.
    pub fn decompress(&self, data: &[u8]) -> SiloResult<Vec<u8>> {
        match self.codec {
            Codec::None => Ok(data.to_vec()),
            Codec::Zstd => Ok(zstd::decode_all(data)?),
        }
    }

    /// Map onto the Parquet codec for the file bridge.
    pub fn to_parquet_compression(&self) -> Compression {
        match self.codec {
            Codec::None => Compression::UNCOMPRESSED,
            Codec::Zstd => {
                let level = self.level.clamp(1, 22);
                match parquet::basic::ZstdLevel::try_new(level) {
                    Ok(l) => Compression::ZSTD(l),
                    Err(_) => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
                }
            }
        }
    }
}

impl std::fmt::Display for CompressionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.codec {
            Codec::None => write!(f, "none"),
            Codec::Zstd => write!(f, "zstd({})", self.level),
        }
    }
}

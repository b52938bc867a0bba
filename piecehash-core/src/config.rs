//! Hashing configuration
//!
//! Segment size and erasure shard counts shared by every hash engine.
//! Override at runtime via PIECEHASH_SEGMENT_SIZE / PIECEHASH_DATA_SHARDS /
//! PIECEHASH_PARITY_SHARDS.

use crate::erasure::ErasureConfig;
use crate::error::{PieceHashError, Result};
use crate::{DATA_SHARDS, DEFAULT_SEGMENT_SIZE, PARITY_SHARDS};
use serde::{Deserialize, Serialize};

/// Segment size and erasure layout of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    /// Segment size in bytes
    #[serde(default = "default_segment_size")]
    pub segment_size: usize,

    /// Number of data shards per segment
    #[serde(default = "default_data_shards")]
    pub data_shards: usize,

    /// Number of parity shards per segment
    #[serde(default = "default_parity_shards")]
    pub parity_shards: usize,
}

fn default_segment_size() -> usize {
    DEFAULT_SEGMENT_SIZE
}

fn default_data_shards() -> usize {
    DATA_SHARDS
}

fn default_parity_shards() -> usize {
    PARITY_SHARDS
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            data_shards: DATA_SHARDS,
            parity_shards: PARITY_SHARDS,
        }
    }
}

impl HashConfig {
    /// Create a validated configuration
    pub fn new(segment_size: usize, data_shards: usize, parity_shards: usize) -> Result<Self> {
        let config = Self {
            segment_size,
            data_shards,
            parity_shards,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read the configuration from environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let config = Self {
            segment_size: env_or("PIECEHASH_SEGMENT_SIZE", DEFAULT_SEGMENT_SIZE)?,
            data_shards: env_or("PIECEHASH_DATA_SHARDS", DATA_SHARDS)?,
            parity_shards: env_or("PIECEHASH_PARITY_SHARDS", PARITY_SHARDS)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject non-positive sizes and counts
    pub fn validate(&self) -> Result<()> {
        if self.segment_size == 0 {
            return Err(PieceHashError::InvalidConfig(
                "segment_size must be > 0".to_string(),
            ));
        }
        self.erasure().validate()
    }

    /// Erasure layout of each segment
    pub fn erasure(&self) -> ErasureConfig {
        ErasureConfig {
            data_shards: self.data_shards,
            parity_shards: self.parity_shards,
        }
    }

    /// Total number of lanes
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Number of digests in a hash tree root
    pub fn root_len(&self) -> usize {
        self.total_shards() + 1
    }
}

fn env_or(key: &str, default: usize) -> Result<usize> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<usize>().map_err(|_| {
            PieceHashError::InvalidConfig(format!("{} is not a valid size: {:?}", key, value))
        }),
        Err(_) => Ok(default),
    }
}

//! Reed-Solomon Erasure Coding
//!
//! Systematic (k data, m parity) coding of one segment:
//! - lanes 0..k are zero-padded partitions of the segment
//! - lanes k..k+m are parity over GF(2^8)
//! - any k surviving lanes reconstruct the segment

use crate::error::{PieceHashError, Result};
use crate::{DATA_SHARDS, PARITY_SHARDS};
use bytes::Bytes;
use reed_solomon_erasure::galois_8::ReedSolomon;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest shard count supported by GF(2^8)
pub const MAX_TOTAL_SHARDS: usize = 256;

/// Erasure coding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureConfig {
    /// Number of data shards (k)
    pub data_shards: usize,
    /// Number of parity shards (m)
    pub parity_shards: usize,
}

impl Default for ErasureConfig {
    fn default() -> Self {
        Self {
            data_shards: DATA_SHARDS,
            parity_shards: PARITY_SHARDS,
        }
    }
}

impl ErasureConfig {
    /// Create a new erasure config
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        let config = Self {
            data_shards,
            parity_shards,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the shard counts
    pub fn validate(&self) -> Result<()> {
        if self.data_shards == 0 {
            return Err(PieceHashError::InvalidConfig(
                "data_shards must be > 0".to_string(),
            ));
        }
        if self.parity_shards == 0 {
            return Err(PieceHashError::InvalidConfig(
                "parity_shards must be > 0".to_string(),
            ));
        }
        if self.total_shards() > MAX_TOTAL_SHARDS {
            return Err(PieceHashError::InvalidConfig(format!(
                "data_shards + parity_shards must be <= {}, got {}",
                MAX_TOTAL_SHARDS,
                self.total_shards()
            )));
        }
        Ok(())
    }

    /// Total number of shards
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Maximum number of lost shards that can be tolerated
    pub fn max_failures(&self) -> usize {
        self.parity_shards
    }

    /// Byte length of every shard of a segment of `segment_len` bytes
    pub fn shard_size(&self, segment_len: usize) -> usize {
        segment_len.div_ceil(self.data_shards)
    }
}

/// A single shard of an erasure-coded segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardData {
    /// Lane index (0 to total_shards-1)
    pub index: usize,
    /// Shard data
    pub data: Bytes,
    /// Whether this is a parity shard
    pub is_parity: bool,
}

impl ShardData {
    /// Create a new shard
    pub fn new(index: usize, data: Bytes, is_parity: bool) -> Self {
        Self {
            index,
            data,
            is_parity,
        }
    }

    /// Get shard size
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Reed-Solomon encoder/decoder for one erasure configuration
pub struct ErasureCoder {
    config: ErasureConfig,
    encoder: ReedSolomon,
}

impl ErasureCoder {
    /// Create a coder with the default configuration (4, 2)
    pub fn new() -> Result<Self> {
        Self::with_config(ErasureConfig::default())
    }

    /// Create a coder with a custom configuration
    pub fn with_config(config: ErasureConfig) -> Result<Self> {
        config.validate()?;
        let encoder = ReedSolomon::new(config.data_shards, config.parity_shards)
            .map_err(|e| PieceHashError::InvalidConfig(e.to_string()))?;
        Ok(Self { config, encoder })
    }

    /// Get the erasure configuration
    pub fn config(&self) -> &ErasureConfig {
        &self.config
    }

    /// Encode a segment into `data_shards + parity_shards` shards.
    ///
    /// Every shard is `ceil(segment.len() / data_shards)` bytes; the last
    /// data partition is zero-padded.
    pub fn encode(&self, segment: &[u8]) -> Result<Vec<ShardData>> {
        let shards = self.encode_raw(segment)?;

        Ok(shards
            .into_iter()
            .enumerate()
            .map(|(i, shard)| {
                ShardData::new(i, Bytes::from(shard), i >= self.config.data_shards)
            })
            .collect())
    }

    /// Encode a segment into plain shard buffers, data lanes first.
    pub fn encode_raw(&self, segment: &[u8]) -> Result<Vec<Vec<u8>>> {
        if segment.is_empty() {
            return Err(PieceHashError::EncodeFailure(
                "cannot encode an empty segment".to_string(),
            ));
        }

        let shard_size = self.config.shard_size(segment.len());
        let mut shards: Vec<Vec<u8>> = Vec::with_capacity(self.config.total_shards());

        for part in segment.chunks(shard_size) {
            let mut shard = Vec::with_capacity(shard_size);
            shard.extend_from_slice(part);
            shard.resize(shard_size, 0);
            shards.push(shard);
        }
        // Segments shorter than data_shards * shard_size leave whole lanes empty
        shards.resize(self.config.total_shards(), vec![0u8; shard_size]);

        self.encoder.encode(&mut shards)?;

        debug!(
            segment_len = segment.len(),
            shard_size,
            shards = shards.len(),
            "encoded segment"
        );
        Ok(shards)
    }

    /// Rebuild the original segment from a partial shard set.
    ///
    /// `shards` has one slot per lane; `None` marks a missing shard. At least
    /// `data_shards` slots must be present. Only missing data lanes are
    /// recomputed, and the result is truncated to `original_len`.
    pub fn reconstruct(&self, shards: &[Option<ShardData>], original_len: usize) -> Result<Bytes> {
        let mut slots: Vec<Option<Vec<u8>>> = shards
            .iter()
            .map(|opt| opt.as_ref().map(|s| s.data.to_vec()))
            .collect();
        self.reconstruct_raw(&mut slots, original_len).map(Bytes::from)
    }

    /// Same as [`reconstruct`](Self::reconstruct) over plain buffers.
    ///
    /// Missing data lanes are filled in place.
    pub fn reconstruct_raw(
        &self,
        slots: &mut [Option<Vec<u8>>],
        original_len: usize,
    ) -> Result<Vec<u8>> {
        let total_shards = self.config.total_shards();
        let data_shards = self.config.data_shards;

        if slots.len() != total_shards {
            return Err(PieceHashError::ShardCountMismatch {
                expected: total_shards,
                actual: slots.len(),
            });
        }

        let available = slots.iter().filter(|s| s.is_some()).count();
        if available < data_shards {
            return Err(PieceHashError::InsufficientShards {
                available,
                required: data_shards,
            });
        }

        // All present shards must agree on one length
        let shard_size = slots
            .iter()
            .flatten()
            .map(|s| s.len())
            .next()
            .ok_or(PieceHashError::InsufficientShards {
                available: 0,
                required: data_shards,
            })?;
        if let Some(bad) = slots.iter().flatten().find(|s| s.len() != shard_size) {
            return Err(PieceHashError::ShardSizeMismatch {
                expected: shard_size,
                actual: bad.len(),
            });
        }
        if shard_size == 0 {
            return Err(PieceHashError::ShardSizeMismatch {
                expected: self.config.shard_size(original_len).max(1),
                actual: 0,
            });
        }
        if original_len > shard_size * data_shards {
            return Err(PieceHashError::InvalidConfig(format!(
                "original length {} exceeds {} data shards of {} bytes",
                original_len, data_shards, shard_size
            )));
        }

        let missing_data = slots[..data_shards].iter().filter(|s| s.is_none()).count();
        if missing_data > 0 {
            self.encoder.reconstruct_data(slots)?;
        }

        debug!(
            available,
            missing_data,
            shard_size,
            original_len,
            "reconstructed segment"
        );

        let mut result = Vec::with_capacity(shard_size * data_shards);
        for slot in slots.iter().take(data_shards) {
            match slot {
                Some(shard) => result.extend_from_slice(shard),
                None => {
                    return Err(PieceHashError::Internal(
                        "data shard missing after reconstruction".to_string(),
                    ))
                }
            }
        }

        result.truncate(original_len);
        Ok(result)
    }

    /// Check that parity shards match the data shards
    pub fn verify(&self, shards: &[ShardData]) -> Result<bool> {
        if shards.len() != self.config.total_shards() {
            return Ok(false);
        }

        let expected_size = shards.first().map(|s| s.size()).unwrap_or(0);
        if expected_size == 0 || !shards.iter().all(|s| s.size() == expected_size) {
            return Ok(false);
        }

        let shard_refs: Vec<&[u8]> = shards.iter().map(|s| s.data.as_ref()).collect();
        Ok(self.encoder.verify(&shard_refs)?)
    }
}

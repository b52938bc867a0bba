//! Piece hash trees
//!
//! Every engine turns an object into `data_shards + parity_shards + 1` roots:
//! - root 0 folds the checksums of the plain segments
//! - root `1 + k` folds the checksums of lane `k`'s pieces
//!
//! Checksum lists are always folded in ascending segment order. The three
//! engines differ only in how segments reach [`SegmentHasher`]:
//! - [`batch`]: one pass over a reader
//! - [`stream`]: pushed chunks of any size
//! - [`parallel`]: a bounded worker pool

pub mod batch;
pub mod parallel;
pub mod stream;

pub use batch::{compute, compute_file, compute_hash, compute_tree};
pub use parallel::{compute_parallel, compute_parallel_tree, MAX_WORKERS};
pub use stream::StreamingHasher;

use crate::checksum::{combine, Checksum};
use crate::config::HashConfig;
use crate::erasure::ErasureCoder;
use crate::error::{PieceHashError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Index;
use tracing::debug;

/// Checksums derived from one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDigests {
    /// Segment index
    pub index: usize,
    /// Checksum of the plain segment bytes
    pub segment: Checksum,
    /// Checksum of each lane's piece
    pub lanes: Vec<Checksum>,
    /// Plain segment length
    pub len: usize,
}

/// Erasure codes segments and checksums their pieces
pub struct SegmentHasher {
    coder: ErasureCoder,
    #[cfg(test)]
    fail_on: Option<usize>,
}

impl SegmentHasher {
    /// Create a hasher for the erasure layout of `config`
    pub fn new(config: &HashConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            coder: ErasureCoder::with_config(config.erasure())?,
            #[cfg(test)]
            fail_on: None,
        })
    }

    /// Make `hash_segment` fail for segment `index`
    #[cfg(test)]
    pub(crate) fn set_fail_on(&mut self, index: Option<usize>) {
        self.fail_on = index;
    }

    /// Checksum segment `index` and all of its pieces
    pub fn hash_segment(&self, index: usize, data: &[u8]) -> Result<SegmentDigests> {
        #[cfg(test)]
        if self.fail_on == Some(index) {
            return Err(PieceHashError::EncodeFailure(format!(
                "forced failure at segment {}",
                index
            )));
        }

        let shards = self.coder.encode_raw(data)?;
        let lanes = shards.iter().map(|shard| Checksum::compute(shard)).collect();

        debug!(segment = index, len = data.len(), "hashed segment");
        Ok(SegmentDigests {
            index,
            segment: Checksum::compute(data),
            lanes,
            len: data.len(),
        })
    }

    /// Underlying erasure coder
    pub fn coder(&self) -> &ErasureCoder {
        &self.coder
    }
}

/// Running checksum lists of an object, in segment order
#[derive(Debug, Clone)]
pub struct ChecksumAccumulator {
    segments: Vec<Checksum>,
    lanes: Vec<Vec<Checksum>>,
    content_length: u64,
}

impl ChecksumAccumulator {
    /// Create an empty accumulator for `total_shards` lanes
    pub fn new(total_shards: usize) -> Self {
        Self {
            segments: Vec::new(),
            lanes: vec![Vec::new(); total_shards],
            content_length: 0,
        }
    }

    /// Append the next segment's checksums.
    ///
    /// Segments must arrive in index order.
    pub fn push(&mut self, digests: SegmentDigests) -> Result<()> {
        if digests.index != self.segments.len() {
            return Err(PieceHashError::Internal(format!(
                "segment {} folded out of order, expected {}",
                digests.index,
                self.segments.len()
            )));
        }
        if digests.lanes.len() != self.lanes.len() {
            return Err(PieceHashError::ShardCountMismatch {
                expected: self.lanes.len(),
                actual: digests.lanes.len(),
            });
        }

        self.segments.push(digests.segment);
        for (lane, checksum) in self.lanes.iter_mut().zip(digests.lanes) {
            lane.push(checksum);
        }
        self.content_length += digests.len as u64;
        Ok(())
    }

    /// Number of segments folded so far
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Bytes covered by the folded segments
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Finish into the full checksum lists
    pub fn into_tree(self) -> HashTree {
        HashTree {
            segment_checksums: self.segments,
            lane_checksums: self.lanes,
            content_length: self.content_length,
        }
    }
}

/// Checksum lists of an object and the totals derived from them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTree {
    /// Checksum of each plain segment
    pub segment_checksums: Vec<Checksum>,
    /// Checksum of each piece, per lane
    pub lane_checksums: Vec<Vec<Checksum>>,
    /// Total bytes covered
    pub content_length: u64,
}

impl HashTree {
    /// Fold every list into its root
    pub fn root(&self) -> HashTreeRoot {
        let mut roots = Vec::with_capacity(self.lane_checksums.len() + 1);
        roots.push(combine(&self.segment_checksums));
        roots.extend(self.lane_checksums.iter().map(|lane| combine(lane)));
        HashTreeRoot(roots)
    }

    /// Number of segments
    pub fn segment_count(&self) -> usize {
        self.segment_checksums.len()
    }

    /// Checksum list of lane `k`
    pub fn lane(&self, k: usize) -> Option<&[Checksum]> {
        self.lane_checksums.get(k).map(Vec::as_slice)
    }
}

/// Smallest valid root: the segment root plus one data and one parity lane
pub const MIN_ROOT_LEN: usize = 3;

/// Roots of an object's hash tree.
///
/// Index 0 covers the plain segments; index `1 + k` covers lane `k`.
/// Deserialized roots must hold at least [`MIN_ROOT_LEN`] checksums.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Checksum>")]
pub struct HashTreeRoot(Vec<Checksum>);

impl HashTreeRoot {
    /// Root over the plain segment checksums
    pub fn segment_root(&self) -> &Checksum {
        &self.0[0]
    }

    /// Roots of each lane, in lane order
    pub fn lane_roots(&self) -> &[Checksum] {
        &self.0[1..]
    }

    /// Root of lane `k`
    pub fn lane_root(&self, k: usize) -> Option<&Checksum> {
        self.0.get(k + 1)
    }

    /// All roots
    pub fn as_slice(&self) -> &[Checksum] {
        &self.0
    }

    /// Number of roots
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// False for every root built by an engine or deserialized
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex encoding of every root
    pub fn to_hex(&self) -> Vec<String> {
        self.0.iter().map(Checksum::to_hex).collect()
    }

    /// Base64 encoding of every root
    pub fn to_base64(&self) -> Vec<String> {
        self.0.iter().map(Checksum::to_base64).collect()
    }

    /// Unwrap into the list of roots
    pub fn into_vec(self) -> Vec<Checksum> {
        self.0
    }
}

impl TryFrom<Vec<Checksum>> for HashTreeRoot {
    type Error = PieceHashError;

    fn try_from(roots: Vec<Checksum>) -> Result<Self> {
        if roots.len() < MIN_ROOT_LEN {
            return Err(PieceHashError::InvalidChecksum(format!(
                "hash tree root needs at least {} checksums, got {}",
                MIN_ROOT_LEN,
                roots.len()
            )));
        }
        Ok(Self(roots))
    }
}

impl Index<usize> for HashTreeRoot {
    type Output = Checksum;

    fn index(&self, index: usize) -> &Checksum {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a HashTreeRoot {
    type Item = &'a Checksum;
    type IntoIter = std::slice::Iter<'a, Checksum>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

//! Checksum primitives for piece hash trees
//!
//! Provides:
//! - SHA-256 checksums of segments and pieces
//! - The flat digest-of-digests combinator used for every hash root
//! - Integrity checks for challenged pieces

use crate::error::{PieceHashError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Checksum size in bytes (SHA-256)
pub const CHECKSUM_SIZE: usize = 32;

/// SHA-256 checksum of a segment, a piece, or a list of checksums
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum([u8; CHECKSUM_SIZE]);

impl Checksum {
    /// Compute the SHA-256 checksum of data
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice (validates length)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; CHECKSUM_SIZE] = slice.try_into().map_err(|_| {
            PieceHashError::InvalidChecksum(format!(
                "expected {} bytes, got {}",
                CHECKSUM_SIZE,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw checksum bytes
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_SIZE] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| PieceHashError::InvalidChecksum(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Convert to standard base64 (the form embedded in signed object metadata)
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Parse from standard base64
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| PieceHashError::InvalidChecksum(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Verify that data matches this checksum
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Checksum {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
            Self::from_slice(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

/// Checksum of one segment or piece
pub fn digest(data: &[u8]) -> Checksum {
    Checksum::compute(data)
}

/// Checksum over the plain concatenation of `checksums`, in the given order.
///
/// There is no length prefix and no pairwise tree: the result only depends on
/// the concatenated bytes. Verifiers on the network fold lists the same way,
/// so this must not change. `combine(&[])` is the SHA-256 of the empty string.
pub fn combine(checksums: &[Checksum]) -> Checksum {
    let mut hasher = Sha256::new();
    for checksum in checksums {
        hasher.update(checksum.as_bytes());
    }
    Checksum(hasher.finalize().into())
}

/// Integrity hash of a piece list (alias of [`combine`])
pub fn integrity_hash(checksums: &[Checksum]) -> Checksum {
    combine(checksums)
}

/// Check that `checksums` folds to `expected`
pub fn verify_integrity_hash(expected: &Checksum, checksums: &[Checksum]) -> Result<()> {
    let computed = combine(checksums);
    if computed != *expected {
        return Err(PieceHashError::IntegrityMismatch(format!(
            "integrity hash {} does not match checksum list ({})",
            expected, computed
        )));
    }
    Ok(())
}

/// Challenge one piece against a published checksum list and its integrity hash.
///
/// `checksums` is the checksum list of one lane (or of the plain segments) and
/// `index` selects the segment whose piece is being challenged.
pub fn challenge_piece(
    integrity: &Checksum,
    checksums: &[Checksum],
    index: usize,
    piece_data: &[u8],
) -> Result<()> {
    let expected = checksums
        .get(index)
        .ok_or(PieceHashError::ChecksumIndexOutOfRange {
            index,
            len: checksums.len(),
        })?;

    if !expected.verify(piece_data) {
        return Err(PieceHashError::IntegrityMismatch(format!(
            "piece {} does not match its checksum",
            index
        )));
    }

    verify_integrity_hash(integrity, checksums)
}

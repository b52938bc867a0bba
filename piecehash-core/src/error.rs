//! Error types for piecehash
//!
//! Provides a unified error type for segmenting, erasure coding and hashing.

use thiserror::Error;

/// Result type alias for piecehash operations
pub type Result<T> = std::result::Result<T, PieceHashError>;

/// Unified error type for piecehash
#[derive(Error, Debug)]
pub enum PieceHashError {
    // ===== Configuration Errors =====
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ===== I/O Errors =====
    #[error("Stream read failed: {0}")]
    StreamRead(#[from] std::io::Error),

    // ===== Erasure Coding Errors =====
    #[error("Erasure encoding failed: {0}")]
    EncodeFailure(String),

    #[error("Insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("Shard count mismatch: expected {expected}, got {actual}")]
    ShardCountMismatch { expected: usize, actual: usize },

    #[error("Shard size mismatch: expected {expected}, got {actual}")]
    ShardSizeMismatch { expected: usize, actual: usize },

    // ===== Streaming Errors =====
    #[error("Append contract violated: {0}")]
    AppendContractViolation(String),

    // ===== Piece Errors =====
    #[error("Invalid piece key: {0}")]
    InvalidPieceKey(String),

    // ===== Integrity Errors =====
    #[error("Integrity check failed: {0}")]
    IntegrityMismatch(String),

    #[error("Checksum index {index} out of range (list has {len})")]
    ChecksumIndexOutOfRange { index: usize, len: usize },

    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reed_solomon_erasure::Error> for PieceHashError {
    fn from(err: reed_solomon_erasure::Error) -> Self {
        PieceHashError::EncodeFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PieceHashError::InsufficientShards {
            available: 3,
            required: 4,
        };
        assert_eq!(err.to_string(), "Insufficient shards: have 3, need 4");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: PieceHashError = io_err.into();
        assert!(matches!(err, PieceHashError::StreamRead(_)));
    }

    #[test]
    fn test_error_from_reed_solomon() {
        let err: PieceHashError = reed_solomon_erasure::Error::TooFewShardsPresent.into();
        assert!(matches!(err, PieceHashError::EncodeFailure(_)));
    }
}

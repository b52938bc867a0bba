//! piecehash Core Library
//!
//! Redundancy and integrity primitives for objects stored as erasure-coded
//! pieces. This crate provides:
//! - Fixed-size segmenting of object streams
//! - Systematic Reed-Solomon coding of segments (4 data + 2 parity by default)
//! - SHA-256 piece checksums and hash tree roots
//! - Batch, streaming and parallel hash tree engines with identical output

pub mod checksum;
pub mod config;
pub mod erasure;
pub mod error;
pub mod hasher;
pub mod segment;

pub use checksum::{combine, digest, Checksum};
pub use config::HashConfig;
pub use erasure::{ErasureCoder, ErasureConfig, ShardData};
pub use error::{PieceHashError, Result};
pub use hasher::{
    compute, compute_file, compute_hash, compute_parallel, compute_tree, HashTree, HashTreeRoot,
    StreamingHasher, MAX_WORKERS,
};
pub use segment::{decode_segment, encode_segment, Piece, PieceKey, Segment, SegmentReader};

/// Default erasure coding layout
/// - 4 data shards: minimum required to reconstruct a segment
/// - 2 parity shards: any 2 lost pieces are tolerated
/// - 6 pieces per segment, one per storage provider lane
pub const DATA_SHARDS: usize = 4;
pub const PARITY_SHARDS: usize = 2;
pub const TOTAL_SHARDS: usize = DATA_SHARDS + PARITY_SHARDS;

/// Default segment size
pub const DEFAULT_SEGMENT_SIZE: usize = 16 * 1024 * 1024; // 16 MB

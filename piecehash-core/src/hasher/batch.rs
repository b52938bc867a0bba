//! One-pass hash tree computation over a reader

use super::{ChecksumAccumulator, HashTree, HashTreeRoot, SegmentHasher};
use crate::config::HashConfig;
use crate::error::Result;
use crate::segment::SegmentReader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{error, info};

/// Read `reader` to the end and return its hash tree root and content length.
pub fn compute<R: Read>(reader: R, config: &HashConfig) -> Result<(HashTreeRoot, u64)> {
    let tree = compute_tree(reader, config)?;
    Ok((tree.root(), tree.content_length))
}

/// [`compute`] with positional parameters.
pub fn compute_hash<R: Read>(
    reader: R,
    segment_size: usize,
    data_shards: usize,
    parity_shards: usize,
) -> Result<(HashTreeRoot, u64)> {
    let config = HashConfig::new(segment_size, data_shards, parity_shards)?;
    compute(reader, &config)
}

/// Read `reader` to the end and return every checksum list.
pub fn compute_tree<R: Read>(reader: R, config: &HashConfig) -> Result<HashTree> {
    let hasher = SegmentHasher::new(config)?;
    let mut acc = ChecksumAccumulator::new(config.total_shards());

    for segment in SegmentReader::new(reader, config.segment_size)? {
        let segment = segment?;
        let digests = hasher
            .hash_segment(segment.index, &segment.data)
            .inspect_err(|e| error!(segment = segment.index, error = %e, "compute checksum failed"))?;
        acc.push(digests)?;
    }

    info!(
        segments = acc.segment_count(),
        content_length = acc.content_length(),
        "computed hash tree"
    );
    Ok(acc.into_tree())
}

/// Open a local file and compute its hash tree root.
pub fn compute_file(path: impl AsRef<Path>, config: &HashConfig) -> Result<(HashTreeRoot, u64)> {
    let path = path.as_ref();
    let file = File::open(path).inspect_err(|e| {
        error!(path = %path.display(), error = %e, "open file failed");
    })?;
    compute(BufReader::new(file), config)
}

//! Incremental hash tree computation
//!
//! Data may be pushed in chunks of any size up to the segment size; the
//! hasher re-segments it through an owned buffer. Between calls the buffer
//! always holds fewer than `segment_size` bytes.

use super::{ChecksumAccumulator, HashTree, HashTreeRoot, SegmentHasher};
use crate::config::HashConfig;
use crate::error::{PieceHashError, Result};
use std::io;
use tracing::{debug, error, info};

/// Streaming hash tree builder
pub struct StreamingHasher {
    config: HashConfig,
    hasher: SegmentHasher,
    buffer: Vec<u8>,
    acc: ChecksumAccumulator,
    finished: bool,
}

impl StreamingHasher {
    /// Create a hasher ready for the first append
    pub fn new(config: HashConfig) -> Result<Self> {
        let hasher = SegmentHasher::new(&config)?;
        Ok(Self {
            buffer: Vec::with_capacity(config.segment_size),
            acc: ChecksumAccumulator::new(config.total_shards()),
            config,
            hasher,
            finished: false,
        })
    }

    /// Reset all state for a new object
    pub fn init(&mut self) {
        self.buffer.clear();
        self.acc = ChecksumAccumulator::new(self.config.total_shards());
        self.finished = false;
    }

    /// Configuration of this hasher
    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// Bytes waiting for the next segment boundary
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes accepted so far, including buffered bytes
    pub fn content_length(&self) -> u64 {
        self.acc.content_length() + self.buffer.len() as u64
    }

    /// Number of segments flushed so far
    pub fn segment_count(&self) -> usize {
        self.acc.segment_count()
    }

    /// Push the next chunk of the object.
    ///
    /// A chunk may not exceed the segment size. When the chunk completes a
    /// segment, that segment is hashed immediately and any overflow starts
    /// the next one. If hashing fails the hasher is left exactly as it was
    /// before the call.
    pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
        self.check_open()?;
        let segment_size = self.config.segment_size;
        if chunk.len() > segment_size {
            return Err(PieceHashError::AppendContractViolation(format!(
                "chunk of {} bytes exceeds segment size {}",
                chunk.len(),
                segment_size
            )));
        }

        let room = segment_size - self.buffer.len();
        if chunk.len() < room {
            self.buffer.extend_from_slice(chunk);
            return Ok(());
        }

        let (head, tail) = chunk.split_at(room);
        let restore_len = self.buffer.len();
        self.buffer.extend_from_slice(head);
        if let Err(e) = self.flush_segment() {
            self.buffer.truncate(restore_len);
            return Err(e);
        }
        self.buffer.extend_from_slice(tail);

        debug_assert!(self.buffer.len() < segment_size);
        Ok(())
    }

    /// Hash any buffered bytes as the final segment and return the root
    pub fn finish(&mut self) -> Result<(HashTreeRoot, u64)> {
        let tree = self.finish_tree()?;
        Ok((tree.root(), tree.content_length))
    }

    /// Hash any buffered bytes as the final segment and return every checksum list.
    ///
    /// The hasher must be re-initialized with [`init`](Self::init) before reuse.
    pub fn finish_tree(&mut self) -> Result<HashTree> {
        self.check_open()?;
        if !self.buffer.is_empty() {
            self.flush_segment()?;
        }

        self.finished = true;
        let acc = std::mem::replace(
            &mut self.acc,
            ChecksumAccumulator::new(self.config.total_shards()),
        );
        info!(
            segments = acc.segment_count(),
            content_length = acc.content_length(),
            "finished streaming hash"
        );
        Ok(acc.into_tree())
    }

    fn check_open(&self) -> Result<()> {
        if self.finished {
            return Err(PieceHashError::AppendContractViolation(
                "hasher already finished, call init() first".to_string(),
            ));
        }
        Ok(())
    }

    /// Hash the buffer as the next segment; the buffer is only cleared on success
    fn flush_segment(&mut self) -> Result<()> {
        let index = self.acc.segment_count();
        let digests = self
            .hasher
            .hash_segment(index, &self.buffer)
            .inspect_err(|e| error!(segment = index, error = %e, "segment flush failed"))?;
        self.acc.push(digests)?;

        debug!(segment = index, len = self.buffer.len(), "flushed segment");
        self.buffer.clear();
        Ok(())
    }
}

impl io::Write for StreamingHasher {
    /// Accepts bytes up to the next segment boundary
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.config.segment_size - self.buffer.len();
        let n = buf.len().min(room);
        self.append(&buf[..n]).map_err(io::Error::other)?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::batch::compute;
    use std::io::Write;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    fn stream_in_chunks(config: HashConfig, data: &[u8], chunk: usize) -> (HashTreeRoot, u64) {
        let mut hasher = StreamingHasher::new(config).unwrap();
        for part in data.chunks(chunk) {
            hasher.append(part).unwrap();
            assert!(hasher.buffered() < config.segment_size);
        }
        hasher.finish().unwrap()
    }

    #[test]
    fn test_matches_batch_for_any_chunking() {
        let config = HashConfig::new(64, 4, 2).unwrap();
        let data = sample(64 * 5 + 17);
        let expected = compute(data.as_slice(), &config).unwrap();

        for chunk in [1, 7, 63, 64] {
            assert_eq!(stream_in_chunks(config, &data, chunk), expected, "chunk {}", chunk);
        }
    }

    #[test]
    fn test_split_and_exact_boundaries() {
        let config = HashConfig::new(10, 2, 1).unwrap();
        let mut hasher = StreamingHasher::new(config).unwrap();

        hasher.append(&[1; 6]).unwrap();
        assert_eq!(hasher.buffered(), 6);

        // 6 + 7 > 10: four bytes complete the segment, three carry over
        hasher.append(&[2; 7]).unwrap();
        assert_eq!(hasher.segment_count(), 1);
        assert_eq!(hasher.buffered(), 3);

        // 3 + 7 == 10: flushed with nothing left
        hasher.append(&[3; 7]).unwrap();
        assert_eq!(hasher.segment_count(), 2);
        assert_eq!(hasher.buffered(), 0);
        assert_eq!(hasher.content_length(), 20);
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let config = HashConfig::new(10, 2, 1).unwrap();
        let mut hasher = StreamingHasher::new(config).unwrap();
        hasher.append(&[0; 4]).unwrap();

        assert!(matches!(
            hasher.append(&[0; 11]),
            Err(PieceHashError::AppendContractViolation(_))
        ));
        assert_eq!(hasher.buffered(), 4);
    }

    #[test]
    fn test_failed_flush_leaves_state_unchanged() {
        let config = HashConfig::new(10, 2, 1).unwrap();
        let mut hasher = StreamingHasher::new(config).unwrap();

        // Segment 0 flushes cleanly, segment 1 is half buffered
        hasher.append(&[1; 10]).unwrap();
        hasher.append(&[2; 6]).unwrap();
        assert_eq!(hasher.segment_count(), 1);

        hasher.hasher.set_fail_on(Some(1));
        assert!(matches!(
            hasher.append(&[3; 7]),
            Err(PieceHashError::EncodeFailure(_))
        ));
        assert_eq!(hasher.buffered(), 6);
        assert_eq!(hasher.segment_count(), 1);
        assert_eq!(hasher.content_length(), 16);

        // Retrying the same chunk after recovery gives the batch result
        hasher.hasher.set_fail_on(None);
        hasher.append(&[3; 7]).unwrap();
        let mut data = vec![1; 10];
        data.extend_from_slice(&[2; 6]);
        data.extend_from_slice(&[3; 7]);
        assert_eq!(hasher.finish().unwrap(), compute(data.as_slice(), &config).unwrap());
    }

    #[test]
    fn test_failed_final_flush_can_be_retried() {
        let config = HashConfig::new(10, 2, 1).unwrap();
        let mut hasher = StreamingHasher::new(config).unwrap();
        hasher.append(b"tail").unwrap();

        hasher.hasher.set_fail_on(Some(0));
        assert!(hasher.finish().is_err());
        assert_eq!(hasher.buffered(), 4);
        assert_eq!(hasher.content_length(), 4);

        hasher.hasher.set_fail_on(None);
        assert_eq!(hasher.finish().unwrap(), compute(&b"tail"[..], &config).unwrap());
    }

    #[test]
    fn test_empty_stream_and_empty_chunks() {
        let config = HashConfig::new(10, 2, 1).unwrap();
        let expected = compute(io::empty(), &config).unwrap();

        let mut hasher = StreamingHasher::new(config).unwrap();
        assert_eq!(hasher.finish().unwrap(), expected);

        hasher.init();
        hasher.append(&[]).unwrap();
        assert_eq!(hasher.finish().unwrap(), expected);
    }

    #[test]
    fn test_reuse_requires_init() {
        let config = HashConfig::new(10, 2, 1).unwrap();
        let mut hasher = StreamingHasher::new(config).unwrap();
        hasher.append(b"abc").unwrap();
        let first = hasher.finish().unwrap();

        assert!(matches!(
            hasher.append(b"abc"),
            Err(PieceHashError::AppendContractViolation(_))
        ));
        assert!(hasher.finish().is_err());

        hasher.init();
        hasher.append(b"abc").unwrap();
        assert_eq!(hasher.finish().unwrap(), first);
    }

    #[test]
    fn test_io_copy() {
        let config = HashConfig::new(100, 3, 2).unwrap();
        let data = sample(1234);

        let mut hasher = StreamingHasher::new(config).unwrap();
        let copied = io::copy(&mut data.as_slice(), &mut hasher).unwrap();
        assert_eq!(copied, 1234);

        let mut hasher_by_write = StreamingHasher::new(config).unwrap();
        hasher_by_write.write_all(&data).unwrap();

        let expected = compute(data.as_slice(), &config).unwrap();
        assert_eq!(hasher.finish().unwrap(), expected);
        assert_eq!(hasher_by_write.finish().unwrap(), expected);
    }
}

//! Segments and pieces
//!
//! An object is hashed and stored as fixed-size segments. Each segment is
//! erasure coded into pieces, one per lane. Named segments give every piece a
//! stable key: `{object_id}_s{segment}_p{lane}`.

use crate::erasure::{ErasureCoder, ShardData};
use crate::error::{PieceHashError, Result};
use bytes::Bytes;
use std::fmt;
use std::io::{ErrorKind, Read};
use tracing::error;

const SEGMENT_TAG: &str = "_s";
const PIECE_TAG: &str = "_p";

/// One fixed-size slice of an object's byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Position within the object (0-based)
    pub index: usize,
    /// Segment name for piece addressing, if the object is named
    pub name: Option<String>,
    /// Raw segment bytes
    pub data: Bytes,
}

impl Segment {
    /// Create an unnamed segment
    pub fn new(index: usize, data: impl Into<Bytes>) -> Self {
        Self {
            index,
            name: None,
            data: data.into(),
        }
    }

    /// Create a segment of a named object
    pub fn named(object_id: &str, index: usize, data: impl Into<Bytes>) -> Self {
        Self {
            index,
            name: Some(segment_name(object_id, index)),
            data: data.into(),
        }
    }

    /// Get the segment size
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Key of this segment's piece in `lane`
    pub fn piece_key(&self, lane: usize) -> Option<PieceKey> {
        self.name.as_ref().map(|name| PieceKey {
            segment_name: name.clone(),
            segment_index: self.index,
            lane,
        })
    }
}

/// Name of segment `index` of object `object_id`
pub fn segment_name(object_id: &str, index: usize) -> String {
    format!("{}{}{}", object_id, SEGMENT_TAG, index)
}

/// Parsed piece key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PieceKey {
    /// `{object_id}_s{segment}`
    pub segment_name: String,
    /// Segment index encoded in the name
    pub segment_index: usize,
    /// Lane of the piece
    pub lane: usize,
}

impl PieceKey {
    /// Parse `{object_id}_s{segment}_p{lane}`
    pub fn parse(key: &str) -> Result<Self> {
        let invalid = || PieceHashError::InvalidPieceKey(key.to_string());

        let piece_at = key.rfind(PIECE_TAG).ok_or_else(invalid)?;
        let segment_name = &key[..piece_at];
        let lane = key[piece_at + PIECE_TAG.len()..]
            .parse::<usize>()
            .map_err(|_| invalid())?;

        let segment_at = segment_name.rfind(SEGMENT_TAG).ok_or_else(invalid)?;
        let segment_index = segment_name[segment_at + SEGMENT_TAG.len()..]
            .parse::<usize>()
            .map_err(|_| invalid())?;

        Ok(Self {
            segment_name: segment_name.to_string(),
            segment_index,
            lane,
        })
    }
}

impl fmt::Display for PieceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.segment_name, PIECE_TAG, self.lane)
    }
}

/// One erasure-coded piece of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    /// Storage key, present for named segments
    pub key: Option<PieceKey>,
    /// Shard payload and lane
    pub shard: ShardData,
}

impl Piece {
    /// Rebuild a piece from its storage key and payload.
    ///
    /// The lane comes from the key; lanes at or above `data_shards` are parity.
    pub fn from_stored(key: &str, data: impl Into<Bytes>, data_shards: usize) -> Result<Self> {
        let key = PieceKey::parse(key)?;
        let shard = ShardData::new(key.lane, data.into(), key.lane >= data_shards);
        Ok(Self {
            key: Some(key),
            shard,
        })
    }

    /// Lane index of this piece
    pub fn lane(&self) -> usize {
        self.shard.index
    }
}

/// Erasure code a segment into one piece per lane
pub fn encode_segment(coder: &ErasureCoder, segment: &Segment) -> Result<Vec<Piece>> {
    let shards = coder.encode(&segment.data).inspect_err(|e| {
        error!(segment = segment.index, error = %e, "segment encode failed");
    })?;

    Ok(shards
        .into_iter()
        .map(|shard| Piece {
            key: segment.piece_key(shard.index),
            shard,
        })
        .collect())
}

/// Rebuild a segment from its pieces.
///
/// `pieces` has one slot per lane, `None` for lost pieces. The segment index
/// and name are recovered from the first present piece key; pieces without
/// keys yield an unnamed segment with index 0. A piece sitting in another
/// lane's slot, or keyed to a different segment, is `InvalidPieceKey`.
pub fn decode_segment(
    coder: &ErasureCoder,
    pieces: &[Option<Piece>],
    segment_len: usize,
) -> Result<Segment> {
    let key = check_piece_keys(pieces)?;

    let slots: Vec<Option<ShardData>> = pieces
        .iter()
        .map(|p| p.as_ref().map(|p| p.shard.clone()))
        .collect();
    let data = coder.reconstruct(&slots, segment_len).inspect_err(|e| {
        error!(error = %e, "segment reconstruct failed");
    })?;

    Ok(match key {
        Some(key) => Segment {
            index: key.segment_index,
            name: Some(key.segment_name.clone()),
            data,
        },
        None => Segment::new(0, data),
    })
}

/// Check that every present piece belongs to its slot and to one segment.
/// Returns the first piece key, if any.
fn check_piece_keys(pieces: &[Option<Piece>]) -> Result<Option<&PieceKey>> {
    let mut first: Option<&PieceKey> = None;

    for (slot, piece) in pieces.iter().enumerate() {
        let Some(piece) = piece else { continue };
        let misplaced = piece.lane() != slot || piece.key.as_ref().is_some_and(|k| k.lane != slot);
        if misplaced {
            let key = piece
                .key
                .as_ref()
                .map_or_else(|| format!("lane {}", piece.lane()), PieceKey::to_string);
            return Err(PieceHashError::InvalidPieceKey(format!(
                "{} found in slot {}",
                key, slot
            )));
        }

        let Some(key) = piece.key.as_ref() else { continue };
        match first {
            None => first = Some(key),
            Some(seen) if seen.segment_name != key.segment_name => {
                return Err(PieceHashError::InvalidPieceKey(format!(
                    "{} does not belong to segment {}",
                    key, seen.segment_name
                )));
            }
            Some(_) => {}
        }
    }

    Ok(first)
}

/// Splits a byte stream into segments.
///
/// Each segment is filled to `segment_size` bytes unless the stream ends
/// first, so only the final segment can be short. A read error is yielded
/// once and ends the iteration.
pub struct SegmentReader<R> {
    reader: R,
    segment_size: usize,
    next_index: usize,
    bytes_read: u64,
    done: bool,
}

impl<R: Read> SegmentReader<R> {
    /// Create a segment reader; `segment_size` must be positive.
    pub fn new(reader: R, segment_size: usize) -> Result<Self> {
        if segment_size == 0 {
            return Err(PieceHashError::InvalidConfig(
                "segment_size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            reader,
            segment_size,
            next_index: 0,
            bytes_read: 0,
            done: false,
        })
    }

    /// Total bytes returned in segments so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Number of segments returned so far
    pub fn segments_read(&self) -> usize {
        self.next_index
    }

    /// Configured segment size
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    fn fill(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for SegmentReader<R> {
    type Item = Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = vec![0u8; self.segment_size];
        match self.fill(&mut buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                buf.truncate(n);
                if n < self.segment_size {
                    self.done = true;
                }
                let segment = Segment::new(self.next_index, buf);
                self.next_index += 1;
                self.bytes_read += n as u64;
                Some(Ok(segment))
            }
            Err(e) => {
                self.done = true;
                error!(segment = self.next_index, error = %e, "content read failed");
                Some(Err(e.into()))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for SegmentReader<R> {}

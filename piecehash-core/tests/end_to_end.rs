//! End-to-end integration tests for piecehash
//!
//! Tests the complete pipeline: object → segments → pieces → hash tree → lost pieces → segments
//!
//! Run with: cargo test --package piecehash-core --test end_to_end

use piecehash_core::checksum::{challenge_piece, verify_integrity_hash};
use piecehash_core::hasher::compute_parallel_tree;
use piecehash_core::{
    combine, compute, compute_file, compute_parallel, compute_tree, decode_segment, digest,
    encode_segment, ErasureCoder, HashConfig, Piece, PieceHashError, Segment, SegmentReader,
    StreamingHasher, DEFAULT_SEGMENT_SIZE, MAX_WORKERS,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io::Write;
use tempfile::NamedTempFile;

/// Generate pseudo-random object content from a fixed seed
fn generate_object(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; size];
    rng.fill_bytes(&mut data);
    data
}

/// Every way to pick `k` lanes out of `n`
fn lane_subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
    (0u32..1 << n)
        .filter(|mask| mask.count_ones() as usize == k)
        .map(|mask| (0..n).filter(|lane| mask & (1 << lane) != 0).collect())
        .collect()
}

fn stream_hash(config: HashConfig, data: &[u8], chunk: usize) -> (piecehash_core::HashTreeRoot, u64) {
    let mut hasher = StreamingHasher::new(config).unwrap();
    for part in data.chunks(chunk) {
        hasher.append(part).unwrap();
    }
    hasher.finish().unwrap()
}

/// A 32 MiB object at the default layout: two segments, seven roots, and
/// every segment survives the loss of any two pieces.
#[test]
fn test_default_layout_32mb_object() {
    let config = HashConfig::default();
    let object = generate_object(32 * 1024 * 1024, 42);

    let (root, content_length) = compute(object.as_slice(), &config).unwrap();
    assert_eq!(content_length, object.len() as u64);
    assert_eq!(root.len(), 7);
    assert!(root.as_slice().iter().all(|r| r.as_bytes().len() == 32));

    let coder = ErasureCoder::with_config(config.erasure()).unwrap();
    let segments: Vec<Segment> = SegmentReader::new(object.as_slice(), DEFAULT_SEGMENT_SIZE)
        .unwrap()
        .map(|s| s.unwrap())
        .collect();
    assert_eq!(segments.len(), 2);

    for segment in &segments {
        let pieces = encode_segment(&coder, segment).unwrap();
        assert_eq!(pieces.len(), 6);

        for lost in lane_subsets(6, 2) {
            let slots: Vec<Option<Piece>> = pieces
                .iter()
                .map(|p| (!lost.contains(&p.lane())).then(|| p.clone()))
                .collect();
            let rebuilt = decode_segment(&coder, &slots, segment.size()).unwrap();
            assert_eq!(rebuilt.data, segment.data, "segment {} lost {:?}", segment.index, lost);
        }
    }
}

#[test]
fn test_engines_agree_across_sizes() {
    let config = HashConfig::new(4096, 4, 2).unwrap();

    for size in [0, 1, 4095, 4096, 4097, 4096 * 7, 4096 * 7 + 333] {
        let object = generate_object(size, size as u64);
        let expected = compute(object.as_slice(), &config).unwrap();
        assert_eq!(expected.1, size as u64);

        assert_eq!(stream_hash(config, &object, 1000), expected, "stream, size {}", size);
        for workers in 1..=MAX_WORKERS {
            assert_eq!(
                compute_parallel(object.as_slice(), &config, workers).unwrap(),
                expected,
                "parallel x{}, size {}",
                workers,
                size
            );
        }
    }
}

#[test]
fn test_trees_agree_and_fold_to_root() {
    let config = HashConfig::new(1000, 3, 3).unwrap();
    let object = generate_object(5500, 7);

    let batch = compute_tree(object.as_slice(), &config).unwrap();
    let parallel = compute_parallel_tree(object.as_slice(), &config, 4).unwrap();

    let mut hasher = StreamingHasher::new(config).unwrap();
    hasher.write_all(&object).unwrap();
    let streamed = hasher.finish_tree().unwrap();

    assert_eq!(batch, parallel);
    assert_eq!(batch, streamed);
    assert_eq!(batch.segment_count(), 6);
    assert_eq!(batch.content_length, 5500);

    let root = batch.root();
    assert_eq!(*root.segment_root(), combine(&batch.segment_checksums));
    for (lane, checksums) in batch.lane_checksums.iter().enumerate() {
        assert_eq!(root.lane_root(lane), Some(&combine(checksums)));
    }
}

#[test]
fn test_challenge_stored_pieces() {
    let config = HashConfig::new(2048, 4, 2).unwrap();
    let object = generate_object(2048 * 3 + 100, 11);
    let tree = compute_tree(object.as_slice(), &config).unwrap();
    let root = tree.root();
    let coder = ErasureCoder::with_config(config.erasure()).unwrap();

    let segments = SegmentReader::new(object.as_slice(), config.segment_size).unwrap();
    for segment in segments {
        let segment = segment.unwrap();
        let pieces = encode_segment(&coder, &segment).unwrap();
        for piece in &pieces {
            let lane = piece.lane();
            let lane_root = root.lane_root(lane).unwrap();
            let checksums = tree.lane(lane).unwrap();
            challenge_piece(lane_root, checksums, segment.index, &piece.shard.data).unwrap();
        }

        // A tampered piece fails its challenge
        let mut tampered = pieces[1].shard.data.to_vec();
        tampered[0] ^= 0xff;
        assert!(matches!(
            challenge_piece(root.lane_root(1).unwrap(), tree.lane(1).unwrap(), segment.index, &tampered),
            Err(PieceHashError::IntegrityMismatch(_))
        ));
    }

    verify_integrity_hash(root.segment_root(), &tree.segment_checksums).unwrap();
    assert!(matches!(
        challenge_piece(root.segment_root(), &tree.segment_checksums, 4, b""),
        Err(PieceHashError::ChecksumIndexOutOfRange { index: 4, len: 4 })
    ));
}

#[test]
fn test_named_object_pieces_round_trip() {
    let coder = ErasureCoder::new().unwrap();
    let object = generate_object(10_000, 3);

    let segments = SegmentReader::new(object.as_slice(), 4096).unwrap();
    let mut rebuilt = Vec::new();
    for segment in segments {
        let segment = segment.unwrap();
        let named = Segment::named("bafyobject", segment.index, segment.data.clone());
        let pieces = encode_segment(&coder, &named).unwrap();

        assert_eq!(
            pieces[5].key.as_ref().unwrap().to_string(),
            format!("bafyobject_s{}_p5", segment.index)
        );

        // Lose one data and one parity piece
        let slots: Vec<Option<Piece>> = pieces
            .into_iter()
            .map(|p| (p.lane() != 0 && p.lane() != 4).then_some(p))
            .collect();
        let decoded = decode_segment(&coder, &slots, named.size()).unwrap();
        assert_eq!(decoded.index, segment.index);
        assert_eq!(decoded.name, named.name);
        rebuilt.extend_from_slice(&decoded.data);
    }

    assert_eq!(rebuilt, object);
}

#[test]
fn test_too_many_lost_pieces() {
    let coder = ErasureCoder::new().unwrap();
    let segment = Segment::new(0, generate_object(1 << 16, 5));
    let pieces = encode_segment(&coder, &segment).unwrap();

    for lost in lane_subsets(6, 3) {
        let slots: Vec<Option<Piece>> = pieces
            .iter()
            .map(|p| (!lost.contains(&p.lane())).then(|| p.clone()))
            .collect();
        assert!(matches!(
            decode_segment(&coder, &slots, segment.size()),
            Err(PieceHashError::InsufficientShards { available: 3, required: 4 })
        ));
    }
}

#[test]
fn test_compute_file() {
    let config = HashConfig::new(64 * 1024, 4, 2).unwrap();
    let object = generate_object(300 * 1024 + 17, 99);

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&object).unwrap();
    file.flush().unwrap();

    let from_file = compute_file(file.path(), &config).unwrap();
    assert_eq!(from_file, compute(object.as_slice(), &config).unwrap());
    assert_eq!(from_file.1, object.len() as u64);
}

#[test]
fn test_compute_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let result = compute_file(dir.path().join("absent.bin"), &HashConfig::default());
    assert!(matches!(result, Err(PieceHashError::StreamRead(_))));
}

#[test]
fn test_empty_object() {
    let config = HashConfig::default();
    let (root, len) = compute(std::io::empty(), &config).unwrap();

    assert_eq!(len, 0);
    assert_eq!(root.len(), config.root_len());
    // Folding an empty list digests the empty string
    assert!(root.as_slice().iter().all(|r| *r == digest(b"")));
}

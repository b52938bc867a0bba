//! Hash tree computation on a bounded worker pool
//!
//! A single producer (the calling thread) reads segments in order and owns
//! content length accounting. Workers erasure code and checksum segments
//! independently, each keeping its results keyed by segment index. After
//! every worker has joined, results are folded in segment order, so the
//! output is identical to [`compute`](super::batch::compute).

use super::{ChecksumAccumulator, HashTree, HashTreeRoot, SegmentDigests, SegmentHasher};
use crate::config::HashConfig;
use crate::error::{PieceHashError, Result};
use crate::segment::{Segment, SegmentReader};
use crossbeam::channel;
use parking_lot::Mutex;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, error, info};

/// Upper bound on workers, independent of the host's parallelism.
///
/// Every in-flight job holds a full segment buffer.
pub const MAX_WORKERS: usize = 5;

/// Parallel counterpart of [`compute`](super::batch::compute).
///
/// `workers` is clamped to `1..=MAX_WORKERS`.
pub fn compute_parallel<R: Read>(
    reader: R,
    config: &HashConfig,
    workers: usize,
) -> Result<(HashTreeRoot, u64)> {
    let tree = compute_parallel_tree(reader, config, workers)?;
    Ok((tree.root(), tree.content_length))
}

/// Parallel counterpart of [`compute_tree`](super::batch::compute_tree).
pub fn compute_parallel_tree<R: Read>(
    reader: R,
    config: &HashConfig,
    workers: usize,
) -> Result<HashTree> {
    config.validate()?;
    let workers = workers.clamp(1, MAX_WORKERS);

    // One coder per worker, built up front so configuration errors surface here
    let hashers = (0..workers)
        .map(|_| SegmentHasher::new(config))
        .collect::<Result<Vec<_>>>()?;

    hash_with_workers(reader, config, hashers)
}

/// Run the pool with one worker per hasher
fn hash_with_workers<R: Read>(
    reader: R,
    config: &HashConfig,
    hashers: Vec<SegmentHasher>,
) -> Result<HashTree> {
    let workers = hashers.len();
    let segments = SegmentReader::new(reader, config.segment_size)?;

    let (job_tx, job_rx) = channel::bounded::<Segment>(workers);
    let abort = AtomicBool::new(false);
    let first_error: Mutex<Option<PieceHashError>> = Mutex::new(None);

    let (produced, worker_results) = thread::scope(|scope| {
        let handles: Vec<_> = hashers
            .into_iter()
            .enumerate()
            .map(|(worker, hasher)| {
                let job_rx = job_rx.clone();
                let abort = &abort;
                let first_error = &first_error;
                scope.spawn(move || {
                    let mut done = Vec::new();
                    for segment in job_rx.iter() {
                        if abort.load(Ordering::Acquire) {
                            break;
                        }
                        match hasher.hash_segment(segment.index, &segment.data) {
                            Ok(digests) => done.push(digests),
                            Err(e) => {
                                error!(worker, segment = segment.index, error = %e, "segment hash failed");
                                let mut slot = first_error.lock();
                                if slot.is_none() {
                                    *slot = Some(e);
                                }
                                drop(slot);
                                abort.store(true, Ordering::Release);
                                break;
                            }
                        }
                    }
                    debug!(worker, segments = done.len(), "worker finished");
                    done
                })
            })
            .collect();
        drop(job_rx);

        let produced = produce(segments, job_tx, &abort);

        let results: Vec<Vec<SegmentDigests>> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect();
        (produced, results)
    });

    // A read error takes precedence over whatever the workers saw after it
    let (segment_count, content_length) = produced?;
    if let Some(e) = first_error.into_inner() {
        return Err(e);
    }

    let mut slots: Vec<Option<SegmentDigests>> = vec![None; segment_count];
    for digests in worker_results.into_iter().flatten() {
        let index = digests.index;
        let slot = slots.get_mut(index).ok_or_else(|| {
            PieceHashError::Internal(format!("segment {} out of range", index))
        })?;
        if slot.is_some() {
            return Err(PieceHashError::Internal(format!(
                "segment {} hashed twice",
                index
            )));
        }
        *slot = Some(digests);
    }

    let mut acc = ChecksumAccumulator::new(config.total_shards());
    for (index, slot) in slots.into_iter().enumerate() {
        let digests = slot.ok_or_else(|| {
            PieceHashError::Internal(format!("segment {} was never hashed", index))
        })?;
        acc.push(digests)?;
    }

    if acc.content_length() != content_length {
        return Err(PieceHashError::Internal(format!(
            "hashed {} bytes but read {}",
            acc.content_length(),
            content_length
        )));
    }

    info!(
        segments = segment_count,
        content_length,
        workers,
        "computed hash tree in parallel"
    );
    Ok(acc.into_tree())
}

/// Feed segments to the workers. Returns the segment count and bytes read.
fn produce<R: Read>(
    mut segments: SegmentReader<R>,
    job_tx: channel::Sender<Segment>,
    abort: &AtomicBool,
) -> Result<(usize, u64)> {
    // Checked before every read so a failed worker stops further input
    while !abort.load(Ordering::Acquire) {
        let segment = match segments.next() {
            Some(Ok(segment)) => segment,
            Some(Err(e)) => {
                abort.store(true, Ordering::Release);
                return Err(e);
            }
            None => break,
        };
        // Every worker has exited; the failure is already recorded
        if job_tx.send(segment).is_err() {
            break;
        }
    }
    Ok((segments.segments_read(), segments.bytes_read()))
}

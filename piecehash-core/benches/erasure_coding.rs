//! Benchmarks for Reed-Solomon segment coding
//!
//! Run with: cargo bench --package piecehash-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use piecehash_core::erasure::{ErasureCoder, ShardData};

/// Generate test data of specified size
fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Benchmark encoding at various segment sizes
fn bench_encode(c: &mut Criterion) {
    let coder = ErasureCoder::new().unwrap();

    let mut group = c.benchmark_group("segment_encode");

    for size in [
        1024 * 1024,      // 1 MB
        4 * 1024 * 1024,  // 4 MB
        16 * 1024 * 1024, // 16 MB
    ] {
        let data = generate_data(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("encode", format!("{}MB", size / (1024 * 1024))),
            &data,
            |b, data| b.iter(|| coder.encode(black_box(data))),
        );
    }

    group.finish();
}

/// Benchmark reconstruction with various numbers of missing pieces
fn bench_reconstruct(c: &mut Criterion) {
    let coder = ErasureCoder::new().unwrap();
    let data = generate_data(16 * 1024 * 1024);
    let original_len = data.len();

    let shards = coder.encode(&data).unwrap();

    let mut group = c.benchmark_group("segment_reconstruct");
    group.throughput(Throughput::Bytes(original_len as u64));

    for (name, lost) in [
        ("0_missing", vec![]),
        ("1_data_missing", vec![0]),
        ("2_data_missing", vec![1, 3]),
        ("data_and_parity_missing", vec![2, 5]),
    ] {
        let mut slots: Vec<Option<ShardData>> = shards.iter().cloned().map(Some).collect();
        for lane in lost {
            slots[lane] = None;
        }
        group.bench_function(name, |b| {
            b.iter(|| coder.reconstruct(black_box(&slots), original_len))
        });
    }

    group.finish();
}

/// Benchmark parity verification
fn bench_verify(c: &mut Criterion) {
    let coder = ErasureCoder::new().unwrap();
    let data = generate_data(16 * 1024 * 1024);
    let shards = coder.encode(&data).unwrap();

    c.bench_function("verify_shards_16MB", |b| {
        b.iter(|| coder.verify(black_box(&shards)))
    });
}

criterion_group!(benches, bench_encode, bench_reconstruct, bench_verify);
criterion_main!(benches);

//! Performance benchmarks for the DEFLATE codec.
//!
//! Measures compression throughput across levels and data shapes, plus
//! decompression throughput and the gzip/zlib framing overhead.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rflate::{deflate, inflate};
use std::hint::black_box;

/// Generate test data patterns for benchmarking
mod test_data {
    /// Text-like data with plenty of repeated phrases
    pub fn text(size: usize) -> Vec<u8> {
        let phrases: [&[u8]; 4] = [
            b"the quick brown fox jumps over the lazy dog. ",
            b"pack my box with five dozen liquor jugs. ",
            b"how vexingly quick daft zebras jump! ",
            b"sphinx of black quartz, judge my vow. ",
        ];
        let mut data = Vec::with_capacity(size);
        let mut i = 0usize;
        while data.len() < size {
            data.extend_from_slice(phrases[i % phrases.len()]);
            i += 1;
        }
        data.truncate(size);
        data
    }

    /// Random data - essentially incompressible
    pub fn random(size: usize) -> Vec<u8> {
        // Linear congruential generator for reproducible data
        let mut data = Vec::with_capacity(size);
        let mut seed: u64 = 0x123456789ABCDEF0;
        for _ in 0..size {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push((seed >> 32) as u8);
        }
        data
    }
}

fn bench_deflate_levels(c: &mut Criterion) {
    let data = test_data::text(1 << 20);
    let mut group = c.benchmark_group("deflate_text_1mib");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for level in [1u8, 6, 9] {
        group.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, &level| {
            b.iter(|| deflate(black_box(&data), level).unwrap());
        });
    }
    group.finish();
}

fn bench_deflate_random(c: &mut Criterion) {
    let data = test_data::random(1 << 20);
    let mut group = c.benchmark_group("deflate_random_1mib");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_with_input(BenchmarkId::from_parameter(6u8), &6u8, |b, &level| {
        b.iter(|| deflate(black_box(&data), level).unwrap());
    });
    group.finish();
}

fn bench_inflate(c: &mut Criterion) {
    let mut group = c.benchmark_group("inflate_text");
    for size in [4096usize, 65536, 1 << 20] {
        let data = test_data::text(size);
        let compressed = deflate(&data, 6).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &compressed,
            |b, compressed| {
                b.iter(|| inflate(black_box(compressed)).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_containers(c: &mut Criterion) {
    let data = test_data::text(1 << 18);
    let mut group = c.benchmark_group("containers_256kib");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("gzip_roundtrip", |b| {
        b.iter(|| {
            let packed = rflate::gzip::compress(black_box(&data), 6).unwrap();
            rflate::gzip::decompress(&packed).unwrap()
        });
    });
    group.bench_function("zlib_roundtrip", |b| {
        b.iter(|| {
            let packed = rflate::zlib::compress(black_box(&data), 6).unwrap();
            rflate::zlib::decompress(&packed).unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_deflate_levels,
    bench_deflate_random,
    bench_inflate,
    bench_containers
);
criterion_main!(benches);

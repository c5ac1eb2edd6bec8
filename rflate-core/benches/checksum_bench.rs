//! Performance benchmarks for the checksum implementations.
//!
//! Measures CRC-32 and Adler-32 throughput across data sizes and patterns,
//! plus incremental vs single-shot updates.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rflate_core::checksum::{adler32, crc32};
use std::hint::black_box;

/// Generate test data patterns for benchmarking
mod test_data {
    /// Uniform data - all bytes are the same
    pub fn uniform(size: usize) -> Vec<u8> {
        vec![0xAA; size]
    }

    /// Random data - varied byte values
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

fn bench_crc32(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32");
    for size in [64usize, 4096, 65536, 1 << 20] {
        let data = test_data::random(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| crc32(black_box(data)));
        });
    }
    group.finish();
}

fn bench_adler32(c: &mut Criterion) {
    let mut group = c.benchmark_group("adler32");
    for size in [64usize, 4096, 65536, 1 << 20] {
        let data = test_data::uniform(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| adler32(black_box(data)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_crc32, bench_adler32);
criterion_main!(benches);

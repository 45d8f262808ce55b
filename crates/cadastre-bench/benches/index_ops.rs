//! Criterion micro-benchmarks for spatial index build, extend and lookup.

use cadastre_bench::{reference_profile, stress_profile};
use cadastre_index::{IndexConfig, SpatialIndex};
use cadastre_test_utils::brick_tessellation;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// Benchmark: Bulk-load the 10K reference profile.
fn bench_build_10k(c: &mut Criterion) {
    let ds = reference_profile(42);

    c.bench_function("build_10k", |b| {
        b.iter(|| {
            let index = SpatialIndex::build(&ds).unwrap();
            black_box(index);
        });
    });
}

/// Benchmark: Bulk-load the ~100K stress profile.
fn bench_build_100k(c: &mut Criterion) {
    let ds = stress_profile(42);

    let mut group = c.benchmark_group("build_100k");
    group.sample_size(10);
    group.bench_function("bulk_load", |b| {
        b.iter(|| {
            let index = SpatialIndex::build(&ds).unwrap();
            black_box(index);
        });
    });
    group.finish();
}

/// Benchmark: Append 1K parcels onto 10K, incremental vs forced rebuild.
fn bench_extend_1k_onto_10k(c: &mut Criterion) {
    let base = reference_profile(42);
    let index = SpatialIndex::build(&base).unwrap();
    let merged = base.merge(&brick_tessellation(10, 100, 5)).dataset;
    let appended = &merged.features()[base.len()..];

    let incremental = IndexConfig::default();
    let rebuild = IndexConfig { rebuild_ratio: 0.0 };

    let mut group = c.benchmark_group("extend_1k_onto_10k");
    group.bench_function("incremental", |b| {
        b.iter(|| {
            let next = index.extend(&merged, appended, &incremental).unwrap();
            black_box(next);
        });
    });
    group.bench_function("rebuild", |b| {
        b.iter(|| {
            let next = index.extend(&merged, appended, &rebuild).unwrap();
            black_box(next);
        });
    });
    group.finish();
}

/// Benchmark: One candidate lookup per feature of the 10K profile.
fn bench_candidates_all_10k(c: &mut Criterion) {
    let ds = reference_profile(42);
    let index = SpatialIndex::build(&ds).unwrap();

    c.bench_function("candidates_all_10k", |b| {
        b.iter(|| {
            for feature in ds.iter() {
                let hits = index.candidates(&feature.bbox());
                black_box(&hits);
            }
        });
    });
}

criterion_group!(
    benches,
    bench_build_10k,
    bench_build_100k,
    bench_extend_1k_onto_10k,
    bench_candidates_all_10k
);
criterion_main!(benches);

//! Criterion micro-benchmarks for source decoding.

use cadastre_bench::reference_profile;
use cadastre_ingest::{FormatHint, Ingestor, Source};
use cadastre_test_utils::fixtures::{feature_collection, zip_archive};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// Benchmark: Decode a 10K-parcel GeoJSON document, hinted and sniffed.
fn bench_geojson_10k(c: &mut Criterion) {
    let doc = feature_collection(&reference_profile(42)).into_bytes();
    let ingestor = Ingestor::default();

    let mut group = c.benchmark_group("geojson_10k");
    group.sample_size(20);
    group.bench_function("hinted", |b| {
        b.iter(|| {
            let out = ingestor
                .extract(Source::bytes(doc.clone(), None), Some(FormatHint::GeoJson))
                .unwrap();
            black_box(out);
        });
    });
    group.bench_function("detected", |b| {
        b.iter(|| {
            let out = ingestor.extract(Source::bytes(doc.clone(), None), None).unwrap();
            black_box(out);
        });
    });
    group.finish();
}

/// Benchmark: The same document inside a zip archive.
fn bench_zipped_geojson_10k(c: &mut Criterion) {
    let doc = feature_collection(&reference_profile(42)).into_bytes();
    let archive = zip_archive(&[("parcels.geojson", doc.as_slice())]);
    let ingestor = Ingestor::default();

    let mut group = c.benchmark_group("zipped_geojson_10k");
    group.sample_size(20);
    group.bench_function("extract", |b| {
        b.iter(|| {
            let out = ingestor
                .extract(Source::bytes(archive.clone(), None), None)
                .unwrap();
            black_box(out);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_geojson_10k, bench_zipped_geojson_10k);
criterion_main!(benches);

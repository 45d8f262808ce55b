//! Criterion micro-benchmarks for adjacency queries, indexed vs pairwise.

use cadastre_adjacency::{AdjacencyConfig, AdjacencyEngine, Contiguity, GeoPredicate, Relation};
use cadastre_bench::{naive_adjacent, pick_selection, reference_profile};
use cadastre_index::SpatialIndex;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// Benchmark: Touches for one parcel of the 10K reference profile.
fn bench_touches_single_10k(c: &mut Criterion) {
    let ds = reference_profile(42);
    let index = SpatialIndex::build(&ds).unwrap();
    let engine = AdjacencyEngine::default();
    let selection = pick_selection(&ds, 1, 7);

    c.bench_function("touches_single_10k", |b| {
        b.iter(|| {
            let r = engine
                .find_adjacent(&ds, &index, &selection, Relation::Touches)
                .unwrap();
            black_box(r);
        });
    });
}

/// Benchmark: Index-free sweep for the same query, the baseline to beat.
fn bench_touches_single_10k_naive(c: &mut Criterion) {
    let ds = reference_profile(42);
    let predicate = GeoPredicate::default();
    let selection = pick_selection(&ds, 1, 7);

    c.bench_function("touches_single_10k_naive", |b| {
        b.iter(|| {
            let r = naive_adjacent(&ds, &predicate, &selection, Relation::Touches);
            black_box(r);
        });
    });
}

/// Benchmark: Every relation for a 50-parcel selection, Rook and Queen.
fn bench_selection_50_by_relation(c: &mut Criterion) {
    let ds = reference_profile(42);
    let index = SpatialIndex::build(&ds).unwrap();
    let selection = pick_selection(&ds, 50, 11);

    let mut group = c.benchmark_group("selection_50");
    for contiguity in [Contiguity::Rook, Contiguity::Queen] {
        let engine = AdjacencyEngine::new(&AdjacencyConfig { contiguity });
        for relation in Relation::ALL {
            let name = format!("{relation}_{contiguity:?}").to_lowercase();
            group.bench_function(name, |b| {
                b.iter(|| {
                    let r = engine
                        .find_adjacent(&ds, &index, &selection, relation)
                        .unwrap();
                    black_box(r);
                });
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_touches_single_10k,
    bench_touches_single_10k_naive,
    bench_selection_50_by_relation
);
criterion_main!(benches);

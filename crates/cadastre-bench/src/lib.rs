//! Benchmark profiles and baselines for the Cadastre engine.
//!
//! Provides pre-built datasets and a reference implementation to measure
//! the indexed engine against:
//!
//! - [`reference_profile`]: 100x100 brick tessellation (10K parcels)
//! - [`stress_profile`]: 316x316 brick tessellation (~100K parcels)
//! - [`pick_selection`]: deterministic selections via seed
//! - [`naive_adjacent`]: index-free pairwise sweep, the `O(k·N)` baseline

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use cadastre_adjacency::{Relation, RelationPredicate};
use cadastre_core::{Dataset, FeatureId};
use cadastre_test_utils::brick_tessellation;
use std::collections::{BTreeSet, HashSet};

/// Build a reference benchmark profile: 100x100 bricks (10K parcels).
///
/// Rows are cut independently, so most parcels have five or six
/// neighbours, some of them through partial edges.
pub fn reference_profile(seed: u64) -> Dataset {
    brick_tessellation(100, 100, seed)
}

/// Build a stress benchmark profile: 316x316 bricks (~100K parcels).
pub fn stress_profile(seed: u64) -> Dataset {
    brick_tessellation(316, 316, seed)
}

/// Pick `n` distinct feature ids from `dataset`.
///
/// Same hash-and-probe placement for the same seed, so benchmark runs
/// query the same parcels.
pub fn pick_selection(dataset: &Dataset, n: usize, seed: u64) -> Vec<FeatureId> {
    let len = dataset.len();
    let n = n.min(len);
    let mut taken = HashSet::with_capacity(n);
    let mut picks = Vec::with_capacity(n);
    for i in 0..n {
        let mut pos = (seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add((i as u64).wrapping_mul(1442695040888963407))
            % len as u64) as usize;
        // Linear probe to avoid collisions
        while taken.contains(&pos) {
            pos = (pos + 1) % len;
        }
        taken.insert(pos);
        picks.push(dataset.features()[pos].id());
    }
    picks
}

/// Features related to `selected` by testing every pair, no index.
///
/// Unknown selected ids are ignored and undecidable pairs count as
/// unrelated. Result ascending.
pub fn naive_adjacent<P: RelationPredicate>(
    dataset: &Dataset,
    predicate: &P,
    selected: &[FeatureId],
    relation: Relation,
) -> Vec<FeatureId> {
    let selection: BTreeSet<FeatureId> = selected.iter().copied().collect();
    let mut adjacent = BTreeSet::new();
    for sid in &selection {
        let Some(source) = dataset.get(*sid) else {
            continue;
        };
        for candidate in dataset.iter() {
            let cid = candidate.id();
            if selection.contains(&cid) || adjacent.contains(&cid) {
                continue;
            }
            if let Ok(true) = predicate.evaluate(relation, source, candidate) {
                adjacent.insert(cid);
            }
        }
    }
    adjacent.into_iter().collect()
}

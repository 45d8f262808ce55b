//! Algebraic properties of adjacency queries over random tessellations.

use cadastre_adjacency::{AdjacencyConfig, AdjacencyEngine, Contiguity, Relation};
use cadastre_core::{Dataset, FeatureId};
use cadastre_index::SpatialIndex;
use cadastre_test_utils::{brick_tessellation, shuffled, square_grid};
use proptest::prelude::*;

fn engines() -> [AdjacencyEngine; 2] {
    [
        AdjacencyEngine::new(&AdjacencyConfig {
            contiguity: Contiguity::Rook,
        }),
        AdjacencyEngine::new(&AdjacencyConfig {
            contiguity: Contiguity::Queen,
        }),
    ]
}

fn neighbours(
    engine: &AdjacencyEngine,
    ds: &Dataset,
    index: &SpatialIndex,
    id: FeatureId,
    relation: Relation,
) -> Vec<FeatureId> {
    engine
        .find_adjacent(ds, index, &[id], relation)
        .unwrap()
        .adjacent
}

#[test]
fn queries_are_idempotent() {
    let grid = square_grid(6, 6);
    let index = SpatialIndex::build(&grid).unwrap();
    let engine = AdjacencyEngine::default();
    let selection = [FeatureId(7), FeatureId(20)];
    let first = engine
        .find_adjacent(&grid, &index, &selection, Relation::Intersects)
        .unwrap();
    let second = engine
        .find_adjacent(&grid, &index, &selection, Relation::Intersects)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn grid_neighbour_counts_by_position() {
    let grid = square_grid(10, 10);
    let index = SpatialIndex::build(&grid).unwrap();
    let engine = AdjacencyEngine::default();
    let count = |id| neighbours(&engine, &grid, &index, FeatureId(id), Relation::Touches).len();
    assert_eq!(count(0), 2);
    assert_eq!(count(5), 3);
    assert_eq!(count(55), 4);
    assert_eq!(count(99), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn touches_and_intersects_are_symmetric(
        rows in 1usize..6,
        cols in 1usize..6,
        seed in any::<u64>(),
    ) {
        let bricks = brick_tessellation(rows, cols, seed);
        let index = SpatialIndex::build(&bricks).unwrap();
        for engine in engines() {
            for relation in [Relation::Touches, Relation::Intersects] {
                for a in bricks.iter() {
                    for b in neighbours(&engine, &bricks, &index, a.id(), relation) {
                        let back = neighbours(&engine, &bricks, &index, b, relation);
                        prop_assert!(
                            back.contains(&a.id()),
                            "{} {} {} but not the reverse", a.id(), relation, b
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn result_never_contains_a_selected_id(
        picks in proptest::collection::vec(0u64..64, 0..10),
        relation in prop_oneof![
            Just(Relation::Touches),
            Just(Relation::Intersects),
            Just(Relation::Overlaps),
        ],
    ) {
        let grid = square_grid(8, 8);
        let index = SpatialIndex::build(&grid).unwrap();
        let selection: Vec<FeatureId> = picks.into_iter().map(FeatureId).collect();
        let result = AdjacencyEngine::default()
            .find_adjacent(&grid, &index, &selection, relation)
            .unwrap();
        for id in &result.adjacent {
            prop_assert!(!selection.contains(id));
        }
        prop_assert!(result.adjacent.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn feature_order_does_not_change_results(
        seed in any::<u64>(),
        pick in 0u64..20,
    ) {
        let bricks = brick_tessellation(4, 5, 11);
        let mixed = shuffled(&bricks, seed);
        let a_index = SpatialIndex::build(&bricks).unwrap();
        let b_index = SpatialIndex::build(&mixed).unwrap();
        let engine = AdjacencyEngine::default();
        for relation in [Relation::Touches, Relation::Intersects, Relation::Overlaps] {
            prop_assert_eq!(
                neighbours(&engine, &bricks, &a_index, FeatureId(pick), relation),
                neighbours(&engine, &mixed, &b_index, FeatureId(pick), relation)
            );
        }
    }
}

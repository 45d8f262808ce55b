//! The [`AdjacencyEngine`]: index-driven relation queries.

use crate::config::AdjacencyConfig;
use crate::predicate::{GeoPredicate, RelationPredicate};
use crate::relation::Relation;
use cadastre_core::{AdjacencyError, Dataset, FeatureId, Warning};
use cadastre_index::SpatialIndex;
use serde::Serialize;
use std::collections::BTreeSet;

/// Work counters for one [`AdjacencyEngine::find_adjacent`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    /// Index lookups issued (one per selected feature).
    pub index_queries: usize,
    /// Candidate ids returned by the index, including selected ones.
    pub candidates_seen: usize,
    /// Exact predicate evaluations run.
    pub predicate_evaluations: usize,
}

/// Answer to one adjacency query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdjacencyResult {
    /// The selection, deduplicated and ascending.
    pub selected: Vec<FeatureId>,
    /// Relation that was evaluated.
    pub relation: Relation,
    /// Features related to at least one selected feature, ascending.
    /// Never contains a selected id.
    pub adjacent: Vec<FeatureId>,
    /// Pairs the predicate could not decide.
    pub warnings: Vec<Warning>,
    /// Work counters.
    pub stats: QueryStats,
}

/// Finds features related to a selection.
///
/// Stateless between calls: every query reads only the dataset and index
/// it is handed, so one engine can serve concurrent readers.
#[derive(Clone, Debug)]
pub struct AdjacencyEngine<P = GeoPredicate> {
    predicate: P,
}

impl AdjacencyEngine<GeoPredicate> {
    /// Engine backed by [`GeoPredicate`] with `config`'s contiguity rule.
    pub fn new(config: &AdjacencyConfig) -> Self {
        Self {
            predicate: GeoPredicate::new(config.contiguity),
        }
    }
}

impl Default for AdjacencyEngine<GeoPredicate> {
    fn default() -> Self {
        Self::new(&AdjacencyConfig::default())
    }
}

impl<P: RelationPredicate> AdjacencyEngine<P> {
    /// Engine backed by a custom predicate.
    pub fn with_predicate(predicate: P) -> Self {
        Self { predicate }
    }

    /// The predicate in use.
    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    /// Features satisfying `relation` with at least one of `selected`.
    ///
    /// `index` must have been built for `dataset`. Every selected id must
    /// exist; otherwise [`AdjacencyError::NotFound`] lists all missing ids
    /// and nothing is computed. Each selected feature costs one index
    /// query; each candidate that is neither selected nor already matched
    /// costs one predicate evaluation. Pairs the predicate cannot decide
    /// are reported in [`AdjacencyResult::warnings`] and treated as
    /// unrelated.
    pub fn find_adjacent(
        &self,
        dataset: &Dataset,
        index: &SpatialIndex,
        selected: &[FeatureId],
        relation: Relation,
    ) -> Result<AdjacencyResult, AdjacencyError> {
        if !index.is_valid_for(dataset) {
            return Err(AdjacencyError::IndexMismatch);
        }

        let selection: BTreeSet<FeatureId> = selected.iter().copied().collect();
        let missing: Vec<FeatureId> = selection
            .iter()
            .copied()
            .filter(|id| !dataset.contains(*id))
            .collect();
        if !missing.is_empty() {
            return Err(AdjacencyError::NotFound { ids: missing });
        }

        let mut stats = QueryStats::default();
        let mut adjacent = BTreeSet::new();
        let mut warnings = Vec::new();

        for &sid in &selection {
            let Some(source) = dataset.get(sid) else {
                continue;
            };
            let candidates = index.candidates(&source.bbox());
            stats.index_queries += 1;
            stats.candidates_seen += candidates.len();

            for cid in candidates {
                if selection.contains(&cid) || adjacent.contains(&cid) {
                    continue;
                }
                let Some(candidate) = dataset.get(cid) else {
                    continue;
                };
                stats.predicate_evaluations += 1;
                match self.predicate.evaluate(relation, source, candidate) {
                    Ok(true) => {
                        adjacent.insert(cid);
                    }
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(a = %sid, b = %cid, %relation, error = %err, "predicate failed");
                        warnings.push(Warning::pair(sid, cid, err.to_string()));
                    }
                }
            }
        }

        tracing::debug!(
            selected = selection.len(),
            adjacent = adjacent.len(),
            %relation,
            index_queries = stats.index_queries,
            predicate_evaluations = stats.predicate_evaluations,
            "adjacency query finished"
        );

        Ok(AdjacencyResult {
            selected: selection.into_iter().collect(),
            relation,
            adjacent: adjacent.into_iter().collect(),
            warnings,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::PredicateError;
    use crate::relation::Contiguity;
    use cadastre_core::{Crs, Feature, WarningScope};
    use cadastre_test_utils::{dataset_of, grid_id, rect, square_grid};

    fn ids(v: &[u64]) -> Vec<FeatureId> {
        v.iter().copied().map(FeatureId).collect()
    }

    fn ten_by_ten() -> (Dataset, SpatialIndex) {
        let grid = square_grid(10, 10);
        let index = SpatialIndex::build(&grid).unwrap();
        (grid, index)
    }

    #[test]
    fn interior_cell_has_four_rook_neighbours() {
        let (grid, index) = ten_by_ten();
        let engine = AdjacencyEngine::default();
        let centre = grid_id(10, 4, 4);
        for relation in [Relation::Touches, Relation::Intersects] {
            let result = engine
                .find_adjacent(&grid, &index, &[centre], relation)
                .unwrap();
            assert_eq!(
                result.adjacent,
                vec![
                    grid_id(10, 3, 4),
                    grid_id(10, 4, 3),
                    grid_id(10, 4, 5),
                    grid_id(10, 5, 4),
                ]
            );
            assert_eq!(result.stats.index_queries, 1);
            assert!(result.warnings.is_empty());
        }
    }

    #[test]
    fn interior_cell_has_eight_queen_neighbours() {
        let (grid, index) = ten_by_ten();
        let engine = AdjacencyEngine::new(&AdjacencyConfig {
            contiguity: Contiguity::Queen,
        });
        let result = engine
            .find_adjacent(&grid, &index, &[FeatureId(44)], Relation::Touches)
            .unwrap();
        assert_eq!(result.adjacent, ids(&[33, 34, 35, 43, 45, 53, 54, 55]));
    }

    #[test]
    fn tiles_never_overlap() {
        let (grid, index) = ten_by_ten();
        let result = AdjacencyEngine::default()
            .find_adjacent(&grid, &index, &[FeatureId(44)], Relation::Overlaps)
            .unwrap();
        assert!(result.adjacent.is_empty());
    }

    #[test]
    fn corner_cell_has_two_neighbours() {
        let (grid, index) = ten_by_ten();
        let result = AdjacencyEngine::default()
            .find_adjacent(&grid, &index, &[FeatureId(0)], Relation::Touches)
            .unwrap();
        assert_eq!(result.adjacent, ids(&[1, 10]));
    }

    #[test]
    fn selected_features_are_excluded_from_output() {
        let (grid, index) = ten_by_ten();
        let result = AdjacencyEngine::default()
            .find_adjacent(&grid, &index, &ids(&[44, 45]), Relation::Touches)
            .unwrap();
        assert_eq!(result.selected, ids(&[44, 45]));
        assert_eq!(result.adjacent, ids(&[34, 35, 43, 46, 54, 55]));
    }

    #[test]
    fn empty_selection_yields_empty_result() {
        let (grid, index) = ten_by_ten();
        let result = AdjacencyEngine::default()
            .find_adjacent(&grid, &index, &[], Relation::Intersects)
            .unwrap();
        assert!(result.selected.is_empty());
        assert!(result.adjacent.is_empty());
        assert_eq!(result.stats, QueryStats::default());
    }

    #[test]
    fn unknown_ids_are_all_reported() {
        let (grid, index) = ten_by_ten();
        let err = AdjacencyEngine::default()
            .find_adjacent(&grid, &index, &ids(&[500, 3, 200]), Relation::Touches)
            .unwrap_err();
        assert_eq!(err, AdjacencyError::NotFound { ids: ids(&[200, 500]) });
    }

    #[test]
    fn index_from_another_dataset_is_rejected() {
        let (grid, _) = ten_by_ten();
        let other = square_grid(10, 10);
        let index = SpatialIndex::build(&other).unwrap();
        let err = AdjacencyEngine::default()
            .find_adjacent(&grid, &index, &[FeatureId(0)], Relation::Touches)
            .unwrap_err();
        assert_eq!(err, AdjacencyError::IndexMismatch);
    }

    #[test]
    fn duplicate_selection_is_deduplicated() {
        let (grid, index) = ten_by_ten();
        let result = AdjacencyEngine::default()
            .find_adjacent(&grid, &index, &ids(&[0, 0, 0]), Relation::Touches)
            .unwrap();
        assert_eq!(result.selected, ids(&[0]));
        assert_eq!(result.stats.index_queries, 1);
    }

    #[test]
    fn overlapping_parcels_are_found() {
        let ds = dataset_of(vec![
            (1, rect(0.0, 0.0, 2.0, 2.0)),
            (2, rect(1.0, 1.0, 3.0, 3.0)),
            (3, rect(2.0, 0.0, 4.0, 1.0)),
        ]);
        let index = SpatialIndex::build(&ds).unwrap();
        let engine = AdjacencyEngine::default();
        let overlaps = engine
            .find_adjacent(&ds, &index, &[FeatureId(1)], Relation::Overlaps)
            .unwrap();
        assert_eq!(overlaps.adjacent, ids(&[2]));
        let touches = engine
            .find_adjacent(&ds, &index, &[FeatureId(1)], Relation::Touches)
            .unwrap();
        assert_eq!(touches.adjacent, ids(&[3]));
        let intersects = engine
            .find_adjacent(&ds, &index, &[FeatureId(1)], Relation::Intersects)
            .unwrap();
        assert_eq!(intersects.adjacent, ids(&[2, 3]));
    }

    #[test]
    fn coincident_duplicates_intersect_but_neither_touch_nor_overlap() {
        let ds = dataset_of(vec![
            (1, rect(0.0, 0.0, 1.0, 1.0)),
            (2, rect(0.0, 0.0, 1.0, 1.0)),
        ]);
        let index = SpatialIndex::build(&ds).unwrap();
        for contiguity in [Contiguity::Rook, Contiguity::Queen] {
            let engine = AdjacencyEngine::new(&AdjacencyConfig { contiguity });
            let query = |relation| {
                engine
                    .find_adjacent(&ds, &index, &[FeatureId(1)], relation)
                    .unwrap()
            };
            assert!(query(Relation::Touches).adjacent.is_empty());
            assert!(query(Relation::Overlaps).adjacent.is_empty());
            let intersects = query(Relation::Intersects);
            assert_eq!(intersects.adjacent, ids(&[2]), "{contiguity:?}");
            assert_eq!(intersects.selected, ids(&[1]));
        }
    }

    struct Failing;

    impl RelationPredicate for Failing {
        fn evaluate(
            &self,
            _relation: Relation,
            a: &Feature,
            b: &Feature,
        ) -> Result<bool, PredicateError> {
            if a.id() == FeatureId(1) || b.id() == FeatureId(1) {
                Err(PredicateError::Degenerate {
                    reason: "synthetic".into(),
                })
            } else {
                Ok(true)
            }
        }
    }

    #[test]
    fn predicate_failures_become_pair_warnings() {
        let grid = square_grid(1, 3);
        let index = SpatialIndex::build(&grid).unwrap();
        let result = AdjacencyEngine::with_predicate(Failing)
            .find_adjacent(&grid, &index, &[FeatureId(0)], Relation::Touches)
            .unwrap();
        assert!(result.adjacent.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.warnings[0].scope,
            WarningScope::Pair(FeatureId(0), FeatureId(1))
        );
    }

    #[test]
    fn empty_dataset_with_empty_selection() {
        let ds = Dataset::empty(Crs::WORKING);
        let index = SpatialIndex::build(&ds).unwrap();
        let result = AdjacencyEngine::default()
            .find_adjacent(&ds, &index, &[], Relation::Touches)
            .unwrap();
        assert!(result.adjacent.is_empty());
    }
}

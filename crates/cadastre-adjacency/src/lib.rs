//! Topological adjacency queries for Cadastre.
//!
//! Given a dataset, its [`SpatialIndex`](cadastre_index::SpatialIndex) and
//! a selection of feature ids, [`AdjacencyEngine::find_adjacent`] returns
//! every other feature standing in a chosen [`Relation`] to any selected
//! feature. The index narrows candidates by envelope; a
//! [`RelationPredicate`] then decides each candidate exactly.
//!
//! # Example
//!
//! ```
//! use cadastre_adjacency::{AdjacencyEngine, Relation};
//! use cadastre_core::{Crs, Dataset, Feature, FeatureId, Properties};
//! use cadastre_index::SpatialIndex;
//! use geo::polygon;
//!
//! let square = |id: u64, x: f64| {
//!     let poly = polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0)];
//!     Feature::new(FeatureId(id), poly, Properties::new()).unwrap()
//! };
//! let dataset = Dataset::new(vec![square(0, 0.0), square(1, 1.0), square(2, 5.0)], Crs::WORKING, None).unwrap();
//! let index = SpatialIndex::build(&dataset).unwrap();
//!
//! let result = AdjacencyEngine::default()
//!     .find_adjacent(&dataset, &index, &[FeatureId(0)], Relation::Touches)
//!     .unwrap();
//! assert_eq!(result.adjacent, vec![FeatureId(1)]);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod predicate;
pub mod relation;

pub use config::AdjacencyConfig;
pub use engine::{AdjacencyEngine, AdjacencyResult, QueryStats};
pub use predicate::{GeoPredicate, PredicateError, RelationPredicate};
pub use relation::{Contiguity, ParseRelationError, Relation};

// Compile-time: one engine is shared by concurrent readers.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<AdjacencyEngine>();
};

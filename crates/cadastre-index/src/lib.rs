//! Bounding-box spatial index over a Cadastre [`Dataset`](cadastre_core::Dataset).
//!
//! [`SpatialIndex`] is a bulk-loaded R-tree of feature envelopes. It
//! answers "which features have an envelope meeting this box" without
//! scanning the dataset, which is what keeps adjacency queries to
//! `O(k·c)` instead of a pairwise sweep.
//!
//! An index is a structural view only: it stores ids and envelopes, never
//! geometry, and it records the [`DatasetGeneration`](cadastre_core::DatasetGeneration)
//! it was built from so it cannot be paired with any other dataset.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod rtree;

pub use config::{IndexConfig, IndexConfigError};
pub use rtree::{BuildStrategy, Candidates, SpatialIndex};

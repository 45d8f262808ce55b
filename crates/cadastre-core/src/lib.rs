//! Core types for the Cadastre geospatial engine.
//!
//! This is the leaf crate of the workspace. It defines the canonical
//! in-memory data model every other crate exchanges: feature ids,
//! attribute values, envelopes, features, datasets, coordinate reference
//! tags, warnings, cooperative cancellation, and the error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bbox;
pub mod cancel;
pub mod crs;
pub mod dataset;
pub mod error;
pub mod feature;
pub mod geojson;
pub mod id;
pub mod property;
pub mod warning;

pub use bbox::BBox;
pub use cancel::{CancelToken, Cancelled};
pub use crs::Crs;
pub use dataset::{Dataset, Merged, SourceFormat, SourceMetadata};
pub use error::{AdjacencyError, DatasetError, GeometryError, IndexBuildError, IngestError};
pub use feature::Feature;
pub use id::{DatasetGeneration, FeatureId};
pub use property::{Properties, PropertyValue};
pub use warning::{Warning, WarningScope};

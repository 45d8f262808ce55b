//! Cadastre: geospatial ingestion and polygon adjacency for cadastral map viewers.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Cadastre sub-crates. For most users, adding `cadastre` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use cadastre::prelude::*;
//!
//! let doc = r#"{"type": "FeatureCollection", "features": [
//!   {"type": "Feature", "id": 1, "properties": {"lot": "1"},
//!    "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
//!   {"type": "Feature", "id": 2, "properties": {"lot": "2"},
//!    "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}},
//!   {"type": "Feature", "id": 3, "properties": {"lot": "3"},
//!    "geometry": {"type": "Polygon", "coordinates": [[[5,5],[6,5],[6,6],[5,6],[5,5]]]}}]}"#;
//!
//! // Ingest and index once.
//! let extraction = extract(Source::bytes(doc, Some("lots.geojson")), None).unwrap();
//! let dataset = extraction.dataset;
//! let index = SpatialIndex::build(&dataset).unwrap();
//!
//! // Query as often as needed.
//! let result = AdjacencyEngine::default()
//!     .find_adjacent(&dataset, &index, &[FeatureId(1)], Relation::Touches)
//!     .unwrap();
//! assert_eq!(result.adjacent, vec![FeatureId(2)]);
//! ```
//!
//! For a long-lived, shared dataset use [`session::CadastreService`], which
//! owns the published snapshot and speaks in serializable summaries.
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `cadastre-core` | Ids, features, datasets, CRS tags, warnings, errors |
//! | [`ingest`] | `cadastre-ingest` | Format detection, decoding, CRS normalization |
//! | [`index`] | `cadastre-index` | R-tree of feature envelopes |
//! | [`adjacency`] | `cadastre-adjacency` | Relations, predicates, the adjacency engine |
//! | [`session`] | `cadastre-session` | Snapshot publication, service API, background ingest |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, ids and errors (`cadastre-core`).
///
/// Contains [`types::Feature`], [`types::Dataset`], [`types::Crs`],
/// [`types::Warning`] and the error taxonomy shared by every crate.
pub use cadastre_core as types;

/// Source ingestion (`cadastre-ingest`).
///
/// [`ingest::extract`] and [`ingest::Ingestor`] turn GeoJSON, Shapefile,
/// GeoPackage, KML and zip archives into a [`types::Dataset`].
pub use cadastre_ingest as ingest;

/// Spatial index (`cadastre-index`).
///
/// [`index::SpatialIndex`] is bulk-loaded per dataset and tied to its
/// generation.
pub use cadastre_index as index;

/// Adjacency queries (`cadastre-adjacency`).
///
/// [`adjacency::AdjacencyEngine`] evaluates a [`adjacency::Relation`]
/// between a selection and every indexed candidate.
pub use cadastre_adjacency as adjacency;

/// Session state and serving API (`cadastre-session`).
///
/// [`session::DatasetSession`] publishes immutable snapshots;
/// [`session::CadastreService`] wraps it for request handlers and
/// [`session::IngestWorker`] moves ingest off the request path.
pub use cadastre_session as session;

/// Common imports for typical Cadastre usage.
///
/// ```rust
/// use cadastre::prelude::*;
/// ```
///
/// This imports the data model, the ingest entry points, the index, the
/// adjacency engine and the session types.
pub mod prelude {
    // Data model
    pub use cadastre_core::{
        BBox, CancelToken, Crs, Dataset, Feature, FeatureId, Properties, PropertyValue, Warning,
    };

    // Errors
    pub use cadastre_core::{AdjacencyError, GeometryError, IndexBuildError, IngestError};

    // Ingest
    pub use cadastre_ingest::{extract, Extraction, FormatHint, IngestConfig, Ingestor, Source};

    // Index
    pub use cadastre_index::{IndexConfig, SpatialIndex};

    // Adjacency
    pub use cadastre_adjacency::{
        AdjacencyConfig, AdjacencyEngine, AdjacencyResult, Contiguity, Relation,
    };

    // Session
    pub use cadastre_session::{
        CadastreService, DatasetSession, IngestWorker, SessionConfig, SessionError, Snapshot,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use cadastre_test_utils::fixtures::feature_collection;
    use cadastre_test_utils::square_grid;

    #[test]
    fn prelude_covers_the_service_flow() {
        let service = CadastreService::new(SessionConfig::default()).unwrap();
        let bytes = feature_collection(&square_grid(3, 3)).into_bytes();
        service.load(bytes, Some("geojson")).unwrap();
        let resp = service.find_adjacent(&[4], "touches").unwrap();
        assert_eq!(resp.adjacent.len(), 4);
    }

    #[test]
    fn prelude_covers_the_library_flow() {
        let dataset = square_grid(2, 2);
        let index = SpatialIndex::build(&dataset).unwrap();
        let queen = AdjacencyEngine::new(&AdjacencyConfig {
            contiguity: Contiguity::Queen,
        });
        let result = queen
            .find_adjacent(&dataset, &index, &[FeatureId(0)], Relation::Touches)
            .unwrap();
        assert_eq!(result.adjacent, vec![FeatureId(1), FeatureId(2), FeatureId(3)]);
    }
}

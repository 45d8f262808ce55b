//! Vector source ingestion for the Cadastre engine.
//!
//! [`extract`] turns an uploaded file (GeoJSON, Shapefile, GeoPackage,
//! KML, or a zip archive holding one of them) into a
//! [`Dataset`](cadastre_core::Dataset) of polygonal features in the
//! working CRS. Ingest is pure: it touches no shared state, so a failed
//! ingest has no effect beyond its error.
//!
//! Problems that only affect part of the source (an invalid ring, a
//! point feature, an unsupported projection) are recovered and returned
//! as [`Warning`](cadastre_core::Warning)s in the [`Extraction`]. Only
//! whole-source failures are errors.
//!
//! ```
//! use cadastre_ingest::{extract, Source};
//!
//! let doc = r#"{"type": "FeatureCollection", "features": [
//!     {"type": "Feature", "properties": {"lot": "12a"},
//!      "geometry": {"type": "Polygon",
//!                   "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}]}"#;
//! let out = extract(Source::bytes(doc, Some("lots.geojson")), None).unwrap();
//! assert_eq!(out.dataset.len(), 1);
//! assert!(out.warnings.is_empty());
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod archive;
mod assemble;
pub mod config;
mod crs;
mod extract;
mod raw;
mod readers;
pub mod source;

pub use config::{IngestConfig, IngestConfigError};
pub use extract::{extract, Extraction, Ingestor};
pub use source::{FormatHint, Source};

// Compile-time assertion: Ingestor is shareable across worker threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Ingestor>();
    assert::<Extraction>();
};

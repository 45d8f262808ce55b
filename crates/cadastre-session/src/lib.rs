//! The live dataset of one Cadastre session and the API served over it.
//!
//! A [`DatasetSession`] owns exactly one published
//! [`Snapshot`], an immutable dataset plus the spatial index built for
//! it. Writers ([`replace`](DatasetSession::replace),
//! [`append`](DatasetSession::append)) build the next snapshot aside
//! and publish it by swapping one `Arc`; readers clone that `Arc` and
//! keep a consistent view for as long as they need it. A failed,
//! cancelled or timed-out write leaves the previous snapshot published.
//!
//! [`CadastreService`] wraps a session with the ingestor and adjacency
//! engine and speaks in serializable summaries, and [`IngestWorker`]
//! runs its loads and appends on a background thread.
//!
//! ```
//! use cadastre_session::CadastreService;
//!
//! let doc = r#"{"type": "FeatureCollection", "features": [
//!   {"type": "Feature", "id": 1, "properties": {},
//!    "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
//!   {"type": "Feature", "id": 2, "properties": {},
//!    "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}}]}"#;
//!
//! let service = CadastreService::default();
//! let summary = service.load(doc.as_bytes().to_vec(), Some("geojson")).unwrap();
//! assert_eq!(summary.feature_count, 2);
//!
//! let response = service.find_adjacent(&[1], "touches").unwrap();
//! assert_eq!(response.adjacent[0].id.0, 2);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod worker;

pub use config::{ConfigError, SessionConfig, WorkerConfig};
pub use error::SessionError;
pub use service::{AdjacencyResponse, AppendSummary, CadastreService, IngestSummary, LoadSummary};
pub use session::{AppendOutcome, DatasetSession, SessionState};
pub use snapshot::{AttributeRow, FeatureRecord, Snapshot};
pub use worker::{IngestWorker, PendingIngest};

//! Error types for the Cadastre engine, organized by subsystem.
//!
//! Per-feature problems ([`GeometryError`]) are recovered locally and
//! surfaced as warnings. The remaining errors abort the operation that
//! raised them, and never leave a published session half-updated.

use crate::id::FeatureId;
use thiserror::Error;

/// Whole-source ingest failures.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No recognizable vector layer in the source (`FormatError`).
    #[error("no recognizable vector layer: {reason}")]
    Format {
        /// What was tried and why it failed.
        reason: String,
    },
    /// The archive container itself cannot be opened (`CorruptArchiveError`).
    #[error("archive cannot be opened: {reason}")]
    CorruptArchive {
        /// Underlying archive error.
        reason: String,
    },
    /// Reading the source from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Ingest was cancelled before it finished.
    #[error("ingest cancelled")]
    Cancelled,
}

impl IngestError {
    /// Shorthand for [`IngestError::Format`].
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`IngestError::CorruptArchive`].
    pub fn corrupt_archive(reason: impl Into<String>) -> Self {
        Self::CorruptArchive {
            reason: reason.into(),
        }
    }
}

impl From<crate::cancel::Cancelled> for IngestError {
    fn from(_: crate::cancel::Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Why a single feature's geometry was rejected (`GeometryError`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// Geometry is not a polygon or multipolygon.
    #[error("unsupported geometry type {found}")]
    UnsupportedType {
        /// The type that was found.
        found: String,
    },
    /// Geometry has no coordinates at all.
    #[error("geometry is empty")]
    Empty,
    /// A coordinate is NaN or infinite.
    #[error("geometry has non-finite coordinates")]
    NonFinite,
    /// A ring's first and last positions differ.
    #[error("ring {ring} is not closed")]
    UnclosedRing {
        /// Ring index within its polygon (0 = exterior).
        ring: usize,
    },
    /// A ring has fewer than four positions.
    #[error("ring {ring} has {points} positions, need at least 4")]
    TooFewPoints {
        /// Ring index within its polygon (0 = exterior).
        ring: usize,
        /// Number of positions found.
        points: usize,
    },
    /// The exterior ring encloses no area.
    #[error("polygon exterior has zero area")]
    ZeroArea,
    /// The encoded geometry could not be decoded.
    #[error("malformed geometry: {reason}")]
    Malformed {
        /// Decoder diagnostic.
        reason: String,
    },
}

impl GeometryError {
    /// Shorthand for [`GeometryError::Malformed`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Dataset construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    /// Two features share an id.
    #[error("duplicate feature id {id}")]
    DuplicateId {
        /// The repeated id.
        id: FeatureId,
    },
}

/// Fatal spatial index construction failures (`IndexBuildError`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexBuildError {
    /// A feature's envelope has a NaN or infinite bound.
    #[error("feature {id} has a non-finite envelope")]
    NonFiniteEnvelope {
        /// The offending feature.
        id: FeatureId,
    },
    /// The build was cancelled before it finished.
    #[error("index build cancelled")]
    Cancelled,
}

impl From<crate::cancel::Cancelled> for IndexBuildError {
    fn from(_: crate::cancel::Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Adjacency request failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjacencyError {
    /// Selected ids absent from the dataset (`NotFoundError`).
    #[error("feature ids not found: {}", format_ids(ids))]
    NotFound {
        /// Every missing id, ascending.
        ids: Vec<FeatureId>,
    },
    /// The index was built from a different dataset than the one passed.
    #[error("spatial index does not belong to this dataset")]
    IndexMismatch,
}

fn format_ids(ids: &[FeatureId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

//! Errors returned by session, service and worker operations.

use cadastre_adjacency::ParseRelationError;
use cadastre_core::{AdjacencyError, IndexBuildError, IngestError};
use std::time::Duration;
use thiserror::Error;

/// Why a session operation failed.
///
/// None of these leave the session modified: the snapshot published
/// before the failing call is still the published one after it.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The source could not be ingested.
    #[error(transparent)]
    Ingest(IngestError),
    /// The spatial index could not be built.
    #[error(transparent)]
    Index(IndexBuildError),
    /// The adjacency request was rejected.
    #[error(transparent)]
    Adjacency(#[from] AdjacencyError),
    /// The relation name is not one of `touches`, `intersects`, `overlaps`.
    #[error(transparent)]
    InvalidRelation(#[from] ParseRelationError),
    /// The operation was cancelled before publishing.
    #[error("operation cancelled; session unchanged")]
    Cancelled,
    /// A background job did not finish in time and was cancelled.
    #[error("operation timed out after {after:?}; session unchanged")]
    Timeout {
        /// The wait that elapsed.
        after: Duration,
    },
    /// The background worker's queue is full.
    #[error("ingest queue is full")]
    QueueFull,
    /// The background worker has stopped.
    #[error("ingest worker has shut down")]
    WorkerShutdown,
    /// The background worker thread could not be started.
    #[error("failed to spawn ingest worker: {0}")]
    Spawn(#[source] std::io::Error),
}

impl From<IngestError> for SessionError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Cancelled => Self::Cancelled,
            other => Self::Ingest(other),
        }
    }
}

impl From<IndexBuildError> for SessionError {
    fn from(e: IndexBuildError) -> Self {
        match e {
            IndexBuildError::Cancelled => Self::Cancelled,
            other => Self::Index(other),
        }
    }
}

impl From<cadastre_core::Cancelled> for SessionError {
    fn from(_: cadastre_core::Cancelled) -> Self {
        Self::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_normalized() {
        assert!(matches!(
            SessionError::from(IngestError::Cancelled),
            SessionError::Cancelled
        ));
        assert!(matches!(
            SessionError::from(IndexBuildError::Cancelled),
            SessionError::Cancelled
        ));
        assert!(matches!(
            SessionError::from(IngestError::format("empty")),
            SessionError::Ingest(IngestError::Format { .. })
        ));
    }

    #[test]
    fn messages_pass_through() {
        let err = SessionError::from(IngestError::corrupt_archive("bad central directory"));
        assert_eq!(
            err.to_string(),
            "archive cannot be opened: bad central directory"
        );
    }
}

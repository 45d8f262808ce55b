//! Session configuration, validation, and error types.

use cadastre_adjacency::AdjacencyConfig;
use cadastre_index::{IndexConfig, IndexConfigError};
use cadastre_ingest::{IngestConfig, IngestConfigError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

// ── SessionConfig ────────────────────────────────────────────────

/// Everything a [`CadastreService`](crate::CadastreService) needs to start.
///
/// Every section defaults independently, so a serving layer can load a
/// partial JSON or TOML document and get defaults for the rest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Archive and size limits for ingest.
    pub ingest: IngestConfig,
    /// When `append` extends the index instead of rebuilding it.
    pub index: IndexConfig,
    /// Contiguity rule for adjacency queries.
    pub adjacency: AdjacencyConfig,
    /// Background ingest queue settings.
    pub worker: WorkerConfig,
}

/// Settings for [`IngestWorker`](crate::IngestWorker).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Jobs that may wait behind the running one before
    /// `submit_*` reports [`SessionError::QueueFull`](crate::SessionError::QueueFull).
    /// Default: 4.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { queue_capacity: 4 }
    }
}

impl SessionConfig {
    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ingest.validate().map_err(ConfigError::Ingest)?;
        self.index.validate().map_err(ConfigError::Index)?;
        if self.worker.queue_capacity == 0 {
            return Err(ConfigError::QueueCapacityZero);
        }
        Ok(())
    }
}

// ── ConfigError ──────────────────────────────────────────────────

/// Errors detected by [`SessionConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Ingest limits are invalid.
    Ingest(IngestConfigError),
    /// Index settings are invalid.
    Index(IndexConfigError),
    /// The worker queue would hold no jobs.
    QueueCapacityZero,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest(e) => write!(f, "ingest config: {e}"),
            Self::Index(e) => write!(f, "index config: {e}"),
            Self::QueueCapacityZero => write!(f, "worker queue_capacity must be at least 1"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ingest(e) => Some(e),
            Self::Index(e) => Some(e),
            Self::QueueCapacityZero => None,
        }
    }
}

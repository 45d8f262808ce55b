//! Index maintenance configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Controls when [`SpatialIndex::extend`](crate::SpatialIndex::extend)
/// inserts incrementally and when it rebuilds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Largest `appended / existing` feature ratio still handled by
    /// incremental insertion. Above it the tree is bulk-loaded again,
    /// which gives a better-packed tree. Default: 0.25.
    pub rebuild_ratio: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { rebuild_ratio: 0.25 }
    }
}

impl IndexConfig {
    /// Check that `rebuild_ratio` is finite and non-negative.
    pub fn validate(&self) -> Result<(), IndexConfigError> {
        if !self.rebuild_ratio.is_finite() || self.rebuild_ratio < 0.0 {
            return Err(IndexConfigError::InvalidRebuildRatio {
                value: self.rebuild_ratio,
            });
        }
        Ok(())
    }
}

/// Errors detected by [`IndexConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum IndexConfigError {
    /// `rebuild_ratio` is NaN, infinite, or negative.
    InvalidRebuildRatio {
        /// The rejected value.
        value: f64,
    },
}

impl fmt::Display for IndexConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRebuildRatio { value } => {
                write!(f, "rebuild_ratio must be finite and >= 0, got {value}")
            }
        }
    }
}

impl std::error::Error for IndexConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(IndexConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_ratio() {
        for value in [f64::NAN, f64::INFINITY, -0.1] {
            let cfg = IndexConfig {
                rebuild_ratio: value,
            };
            assert!(cfg.validate().is_err());
        }
    }
}

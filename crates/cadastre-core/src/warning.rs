//! Non-fatal problems surfaced alongside successful results.

use crate::id::FeatureId;
use serde::Serialize;
use std::fmt;

/// What a [`Warning`] refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WarningScope {
    /// The source as a whole (archive, layer, CRS).
    Source,
    /// One source feature, identified the way the source identifies it
    /// (record number, placemark id, row id).
    Feature(String),
    /// A pair of dataset features examined by a relation predicate.
    Pair(FeatureId, FeatureId),
}

/// A recovered problem. Partial data loss is always reported as one of
/// these rather than dropped silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// What the warning is about.
    pub scope: WarningScope,
    /// Human-readable description.
    pub message: String,
}

impl Warning {
    /// Warning about the source as a whole.
    pub fn source(message: impl Into<String>) -> Self {
        Self {
            scope: WarningScope::Source,
            message: message.into(),
        }
    }

    /// Warning about a single source feature.
    pub fn feature(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            scope: WarningScope::Feature(feature.into()),
            message: message.into(),
        }
    }

    /// Warning about a pair of dataset features.
    pub fn pair(a: FeatureId, b: FeatureId, message: impl Into<String>) -> Self {
        Self {
            scope: WarningScope::Pair(a, b),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            WarningScope::Source => write!(f, "{}", self.message),
            WarningScope::Feature(feature) => write!(f, "feature {feature}: {}", self.message),
            WarningScope::Pair(a, b) => write!(f, "features {a} and {b}: {}", self.message),
        }
    }
}

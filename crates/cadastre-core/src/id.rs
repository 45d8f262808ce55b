//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a feature within a dataset.
///
/// Unique within one [`Dataset`](crate::Dataset) and stable across
/// queries against the same snapshot. Ordering is numeric, which is the
/// order adjacency results are reported in.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FeatureId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Counter for unique [`DatasetGeneration`] allocation.
static DATASET_GENERATION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of one constructed dataset value.
///
/// Allocated from a monotonic atomic counter every time a dataset is
/// built, merged, or otherwise re-created. A spatial index records the
/// generation it was built from, so an index can never be silently paired
/// with a different dataset even if both have the same feature count.
///
/// Cloning a dataset preserves its generation, which is correct because
/// datasets are immutable once constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetGeneration(u64);

impl DatasetGeneration {
    /// Allocate a fresh, never-before-returned generation. Thread-safe.
    pub fn next() -> Self {
        Self(DATASET_GENERATION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw counter value, for diagnostics.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DatasetGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

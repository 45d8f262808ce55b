//! R-tree backed [`SpatialIndex`].

use cadastre_core::{
    BBox, CancelToken, Dataset, DatasetGeneration, Feature, FeatureId, IndexBuildError,
};
use rstar::{RTree, RTreeObject, AABB};
use smallvec::SmallVec;

use crate::config::IndexConfig;

/// How often (in features) long loops poll the cancel token.
const CANCEL_POLL_INTERVAL: usize = 1024;

/// Candidate ids returned by [`SpatialIndex::candidates`].
///
/// Inline capacity covers the typical parcel neighbourhood without a heap
/// allocation.
pub type Candidates = SmallVec<[FeatureId; 16]>;

/// How an index instance was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Packed from scratch with a sort-tile-recursive bulk load.
    BulkLoad,
    /// Copied from a previous index with the appended envelopes inserted.
    Incremental,
}

/// One envelope stored in the tree.
#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    id: FeatureId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn to_aabb(bbox: &BBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y])
}

fn entry_for(feature: &Feature) -> Result<IndexEntry, IndexBuildError> {
    let bbox = feature.bbox();
    if !bbox.is_finite() {
        return Err(IndexBuildError::NonFiniteEnvelope { id: feature.id() });
    }
    Ok(IndexEntry {
        id: feature.id(),
        envelope: to_aabb(&bbox),
    })
}

/// Envelope index over one dataset snapshot.
///
/// Cloning is `O(n)` and yields an independent tree; [`extend`](Self::extend)
/// relies on that to leave the source index untouched for readers that
/// still hold it.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: RTree<IndexEntry>,
    generation: DatasetGeneration,
    strategy: BuildStrategy,
}

impl SpatialIndex {
    /// Bulk-load an index over every feature envelope in `dataset`.
    pub fn build(dataset: &Dataset) -> Result<Self, IndexBuildError> {
        Self::build_with_cancel(dataset, &CancelToken::new())
    }

    /// [`build`](Self::build), polling `cancel` while collecting envelopes.
    pub fn build_with_cancel(
        dataset: &Dataset,
        cancel: &CancelToken,
    ) -> Result<Self, IndexBuildError> {
        let mut entries = Vec::with_capacity(dataset.len());
        for (n, feature) in dataset.iter().enumerate() {
            if n % CANCEL_POLL_INTERVAL == 0 {
                cancel.check()?;
            }
            entries.push(entry_for(feature)?);
        }
        cancel.check()?;
        let tree = RTree::bulk_load(entries);
        tracing::debug!(
            features = dataset.len(),
            generation = dataset.generation().get(),
            "spatial index bulk-loaded"
        );
        Ok(Self {
            tree,
            generation: dataset.generation(),
            strategy: BuildStrategy::BulkLoad,
        })
    }

    /// Index for `merged`, reusing this index where that is cheaper.
    ///
    /// `merged` must be this index's dataset with `new_features` appended
    /// (as produced by [`Dataset::merge`], so renumbered ids are already
    /// applied). When the appended share is at most
    /// [`IndexConfig::rebuild_ratio`] the tree is copied and the new
    /// envelopes inserted one by one; otherwise, or if the feature counts
    /// do not line up, the index is rebuilt from `merged`. `self` is never
    /// modified.
    pub fn extend(
        &self,
        merged: &Dataset,
        new_features: &[Feature],
        config: &IndexConfig,
    ) -> Result<Self, IndexBuildError> {
        self.extend_with_cancel(merged, new_features, config, &CancelToken::new())
    }

    /// [`extend`](Self::extend) with cooperative cancellation.
    pub fn extend_with_cancel(
        &self,
        merged: &Dataset,
        new_features: &[Feature],
        config: &IndexConfig,
        cancel: &CancelToken,
    ) -> Result<Self, IndexBuildError> {
        let existing = self.len();
        let consistent = existing + new_features.len() == merged.len();
        let small_enough =
            existing > 0 && (new_features.len() as f64) <= config.rebuild_ratio * existing as f64;
        if !consistent || !small_enough {
            tracing::debug!(
                existing,
                appended = new_features.len(),
                consistent,
                "extending index by full rebuild"
            );
            return Self::build_with_cancel(merged, cancel);
        }

        let mut tree = self.tree.clone();
        for (n, feature) in new_features.iter().enumerate() {
            if n % CANCEL_POLL_INTERVAL == 0 {
                cancel.check()?;
            }
            tree.insert(entry_for(feature)?);
        }
        tracing::debug!(
            existing,
            appended = new_features.len(),
            "spatial index extended incrementally"
        );
        Ok(Self {
            tree,
            generation: merged.generation(),
            strategy: BuildStrategy::Incremental,
        })
    }

    /// Ids of every feature whose envelope meets `query`, in tree order.
    ///
    /// Envelopes that only touch `query` along an edge or corner are
    /// included.
    pub fn candidates(&self, query: &BBox) -> Candidates {
        self.tree
            .locate_in_envelope_intersecting(&to_aabb(query))
            .map(|entry| entry.id)
            .collect()
    }

    /// Number of indexed envelopes.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generation of the dataset this index was built for.
    pub fn generation(&self) -> DatasetGeneration {
        self.generation
    }

    /// Whether this index was built for exactly `dataset`.
    pub fn is_valid_for(&self, dataset: &Dataset) -> bool {
        self.generation == dataset.generation()
    }

    /// How this instance was produced.
    pub fn strategy(&self) -> BuildStrategy {
        self.strategy
    }
}

//! Immutable published `(Dataset, SpatialIndex)` pairs.

use cadastre_core::geojson::geometry_to_value;
use cadastre_core::{Dataset, Feature, FeatureId, Properties};
use cadastre_index::SpatialIndex;
use serde::Serialize;

/// One row of the attribute table: id and properties, no geometry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttributeRow {
    /// Feature id.
    pub id: FeatureId,
    /// Feature attributes in source order.
    pub properties: Properties,
}

/// A feature as sent to map clients: geometry as a GeoJSON object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureRecord {
    /// Feature id.
    pub id: FeatureId,
    /// GeoJSON geometry object.
    pub geometry: serde_json::Value,
    /// Feature attributes in source order.
    pub properties: Properties,
}

impl From<&Feature> for FeatureRecord {
    fn from(feature: &Feature) -> Self {
        Self {
            id: feature.id(),
            geometry: geometry_to_value(feature.geometry()),
            properties: feature.properties().clone(),
        }
    }
}

/// A dataset and the index built for it, published together.
///
/// Snapshots are never modified after publication. Readers hold them as
/// `Arc<Snapshot>` and keep a consistent view for as long as they like,
/// whatever writers publish in the meantime.
#[derive(Debug)]
pub struct Snapshot {
    dataset: Dataset,
    index: SpatialIndex,
    epoch: u64,
}

impl Snapshot {
    pub(crate) fn new(dataset: Dataset, index: SpatialIndex, epoch: u64) -> Self {
        debug_assert!(index.is_valid_for(&dataset));
        Self {
            dataset,
            index,
            epoch,
        }
    }

    /// The published dataset.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The index built for [`dataset`](Self::dataset).
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Session epoch at which this snapshot was published.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Tabular projection of every feature, in dataset order.
    pub fn attributes(&self) -> Vec<AttributeRow> {
        self.dataset
            .iter()
            .map(|f| AttributeRow {
                id: f.id(),
                properties: f.properties().clone(),
            })
            .collect()
    }

    /// Client representation of one feature.
    pub fn record(&self, id: FeatureId) -> Option<FeatureRecord> {
        self.dataset.get(id).map(FeatureRecord::from)
    }
}

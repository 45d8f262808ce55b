//! Ordered feature collections sharing one coordinate system.

use crate::bbox::BBox;
use crate::crs::Crs;
use crate::error::DatasetError;
use crate::feature::Feature;
use crate::id::{DatasetGeneration, FeatureId};
use crate::warning::Warning;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Vector format a dataset was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceFormat {
    /// RFC 7946 GeoJSON (legacy `crs` member honoured).
    GeoJson,
    /// ESRI Shapefile set (`.shp` with sidecars).
    Shapefile,
    /// OGC GeoPackage (SQLite container).
    GeoPackage,
    /// OGC KML.
    Kml,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GeoJson => "GeoJSON",
            Self::Shapefile => "Shapefile",
            Self::GeoPackage => "GeoPackage",
            Self::Kml => "KML",
        };
        f.write_str(name)
    }
}

/// Where a dataset's features came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMetadata {
    /// Originating file name (archive entry name for archived sources).
    pub filename: Option<String>,
    /// Layer or table name within the file, for multi-layer formats.
    pub layer: Option<String>,
    /// Format the features were decoded from.
    pub format: SourceFormat,
}

/// An ordered sequence of features plus CRS and provenance.
///
/// Feature ids are unique; lookup by id is O(1). A dataset is immutable
/// once built: [`merge`](Self::merge) produces a new dataset with a new
/// [`DatasetGeneration`].
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Vec<Feature>,
    crs: Crs,
    sources: Vec<SourceMetadata>,
    generation: DatasetGeneration,
    lookup: HashMap<FeatureId, usize>,
}

/// Result of [`Dataset::merge`].
#[derive(Debug, Clone)]
pub struct Merged {
    /// The combined dataset.
    pub dataset: Dataset,
    /// `(original, assigned)` ids of appended features that collided.
    pub renumbered: Vec<(FeatureId, FeatureId)>,
    /// Problems noticed while merging (CRS mismatch, renumbering).
    pub warnings: Vec<Warning>,
}

impl Dataset {
    /// Build a dataset. Fails if two features share an id.
    pub fn new(
        features: Vec<Feature>,
        crs: Crs,
        source: Option<SourceMetadata>,
    ) -> Result<Self, DatasetError> {
        Self::from_parts(features, crs, source.into_iter().collect())
    }

    /// A dataset with no features.
    pub fn empty(crs: Crs) -> Self {
        Self {
            features: Vec::new(),
            crs,
            sources: Vec::new(),
            generation: DatasetGeneration::next(),
            lookup: HashMap::new(),
        }
    }

    fn from_parts(
        features: Vec<Feature>,
        crs: Crs,
        sources: Vec<SourceMetadata>,
    ) -> Result<Self, DatasetError> {
        let mut lookup = HashMap::with_capacity(features.len());
        for (pos, feature) in features.iter().enumerate() {
            if lookup.insert(feature.id(), pos).is_some() {
                return Err(DatasetError::DuplicateId { id: feature.id() });
            }
        }
        Ok(Self {
            features,
            crs,
            sources,
            generation: DatasetGeneration::next(),
            lookup,
        })
    }

    /// Features in dataset order.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Iterate features in dataset order.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the dataset has no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Look up a feature by id.
    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.lookup.get(&id).map(|&pos| &self.features[pos])
    }

    /// Whether a feature with this id exists.
    pub fn contains(&self, id: FeatureId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Coordinate reference system of every feature.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Provenance of the features, one entry per ingested source.
    pub fn sources(&self) -> &[SourceMetadata] {
        &self.sources
    }

    /// Identity of this dataset value.
    pub fn generation(&self) -> DatasetGeneration {
        self.generation
    }

    /// Union of every feature envelope, `None` when empty.
    pub fn bbox(&self) -> Option<BBox> {
        self.features
            .iter()
            .map(Feature::bbox)
            .reduce(|acc, b| acc.union(&b))
    }

    /// Largest feature id, `None` when empty.
    pub fn max_id(&self) -> Option<FeatureId> {
        self.lookup.keys().copied().max()
    }

    /// Append `other`'s features after this dataset's.
    ///
    /// Appended ids that collide with an id already present are renumbered
    /// to `max_id + 1, max_id + 2, ...` in `other`'s order, where `max_id`
    /// covers both datasets so a fresh id never collides with a
    /// not-yet-appended one. Past `u64::MAX` the smallest ids free in both
    /// datasets are used instead. If the two datasets disagree on CRS, the result
    /// is tagged [`Crs::Unknown`] and a warning is recorded.
    pub fn merge(&self, other: &Dataset) -> Merged {
        let mut warnings = Vec::new();
        let crs = if self.is_empty() {
            other.crs
        } else if other.is_empty() || self.crs == other.crs {
            self.crs
        } else {
            warnings.push(Warning::source(format!(
                "appended features are in {} but the dataset is in {}; result CRS is unknown",
                other.crs, self.crs
            )));
            Crs::Unknown
        };

        let mut ids = IdAllocator {
            next: self
                .max_id()
                .into_iter()
                .chain(other.max_id())
                .max()
                .map_or(Some(0), |id| id.0.checked_add(1)),
            low: 0,
            incoming: &other.lookup,
        };
        let mut lookup = self.lookup.clone();
        lookup.reserve(other.len());
        let mut features = self.features.clone();
        features.reserve(other.len());
        let mut renumbered = Vec::new();

        for feature in &other.features {
            let mut feature = feature.clone();
            if lookup.contains_key(&feature.id()) {
                let assigned = ids.allocate(&lookup);
                renumbered.push((feature.id(), assigned));
                feature = feature.with_id(assigned);
            }
            lookup.insert(feature.id(), features.len());
            features.push(feature);
        }

        if !renumbered.is_empty() {
            warnings.push(Warning::source(format!(
                "{} appended feature ids collided with existing ids and were renumbered",
                renumbered.len()
            )));
        }

        let mut sources = self.sources.clone();
        sources.extend(other.sources.iter().cloned());

        Merged {
            dataset: Dataset {
                features,
                crs,
                sources,
                generation: DatasetGeneration::next(),
                lookup,
            },
            renumbered,
            warnings,
        }
    }
}

/// Fresh ids for renumbered features: above every id of both datasets,
/// then the smallest free ones once `u64::MAX` has been handed out.
struct IdAllocator<'a> {
    next: Option<u64>,
    low: u64,
    incoming: &'a HashMap<FeatureId, usize>,
}

impl IdAllocator<'_> {
    fn allocate(&mut self, taken: &HashMap<FeatureId, usize>) -> FeatureId {
        if let Some(id) = self.next {
            self.next = id.checked_add(1);
            return FeatureId(id);
        }
        // Fewer than u64::MAX ids exist, so a free one lies below u64::MAX.
        while taken.contains_key(&FeatureId(self.low))
            || self.incoming.contains_key(&FeatureId(self.low))
        {
            self.low += 1;
        }
        let id = FeatureId(self.low);
        self.low += 1;
        id
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

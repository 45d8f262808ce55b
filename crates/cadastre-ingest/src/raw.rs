//! Decoded-but-unvalidated layers handed from readers to assembly.

use cadastre_core::{GeometryError, Properties, PropertyValue, SourceFormat, Warning};
use geo_types::Geometry;

/// CRS as the source declared it, before normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DeclaredCrs {
    /// An EPSG code was found.
    Epsg(u32),
    /// A declaration exists but could not be interpreted.
    Unrecognized(String),
    /// Nothing was declared and the format has no default.
    Undeclared,
}

/// One source record.
#[derive(Clone, Debug)]
pub(crate) struct RawFeature {
    /// How the source refers to this record, for warnings.
    pub key: String,
    /// Identifier carried by the source, if any.
    pub source_id: Option<PropertyValue>,
    /// Decoded geometry, or why decoding failed.
    pub geometry: Result<Geometry<f64>, GeometryError>,
    /// Attributes in source order.
    pub properties: Properties,
}

/// Everything one reader produced for one layer.
#[derive(Clone, Debug)]
pub(crate) struct RawLayer {
    pub format: SourceFormat,
    pub filename: Option<String>,
    pub layer: Option<String>,
    pub crs: DeclaredCrs,
    pub features: Vec<RawFeature>,
    pub warnings: Vec<Warning>,
}

impl RawLayer {
    pub fn new(format: SourceFormat, crs: DeclaredCrs) -> Self {
        Self {
            format,
            filename: None,
            layer: None,
            crs,
            features: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

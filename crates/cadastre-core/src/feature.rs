//! A single polygonal feature: id, geometry, attributes, cached envelope.

use crate::bbox::BBox;
use crate::error::GeometryError;
use crate::id::FeatureId;
use crate::property::Properties;
use geo_types::{Geometry, LineString, Polygon};

/// One geometry plus its attributes and stable id.
///
/// The geometry is always a polygon or multipolygon that passed
/// [`validate_areal`]. `bbox` is derived from it at construction and
/// recomputed by [`with_geometry`](Self::with_geometry); no other method
/// can change the geometry, so the cached envelope never goes stale.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: FeatureId,
    geometry: Geometry<f64>,
    properties: Properties,
    bbox: BBox,
}

impl Feature {
    /// Build a feature, validating the geometry and computing its envelope.
    pub fn new(
        id: FeatureId,
        geometry: impl Into<Geometry<f64>>,
        properties: Properties,
    ) -> Result<Self, GeometryError> {
        let geometry = geometry.into();
        validate_areal(&geometry)?;
        let bbox = BBox::from_geometry(&geometry).ok_or(GeometryError::Empty)?;
        Ok(Self {
            id,
            geometry,
            properties,
            bbox,
        })
    }

    /// The feature id.
    pub fn id(&self) -> FeatureId {
        self.id
    }

    /// The polygonal geometry.
    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// Attribute values in source column order.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Envelope of [`geometry`](Self::geometry).
    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    /// Same feature under a different id.
    pub fn with_id(mut self, id: FeatureId) -> Self {
        self.id = id;
        self
    }

    /// Same feature with a replacement geometry; the envelope is recomputed.
    pub fn with_geometry(
        self,
        geometry: impl Into<Geometry<f64>>,
    ) -> Result<Self, GeometryError> {
        Self::new(self.id, geometry, self.properties)
    }
}

/// Check that a geometry is a usable polygon or multipolygon.
///
/// Rejects non-areal types, empty geometries, non-finite coordinates,
/// unclosed rings, rings with fewer than four positions, and exteriors
/// enclosing no area. Self-intersection is not checked here; predicates
/// report such geometries at query time.
pub fn validate_areal(geometry: &Geometry<f64>) -> Result<(), GeometryError> {
    match geometry {
        Geometry::Polygon(poly) => validate_polygon(poly),
        Geometry::MultiPolygon(multi) => {
            if multi.0.is_empty() {
                return Err(GeometryError::Empty);
            }
            multi.0.iter().try_for_each(validate_polygon)
        }
        other => Err(GeometryError::UnsupportedType {
            found: geometry_type_name(other).to_owned(),
        }),
    }
}

fn validate_polygon(poly: &Polygon<f64>) -> Result<(), GeometryError> {
    if poly.exterior().0.is_empty() {
        return Err(GeometryError::Empty);
    }
    let rings = std::iter::once(poly.exterior()).chain(poly.interiors());
    for (ring_idx, ring) in rings.enumerate() {
        validate_ring(ring, ring_idx)?;
    }
    if ring_twice_area(poly.exterior()) == 0.0 {
        return Err(GeometryError::ZeroArea);
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>, ring_idx: usize) -> Result<(), GeometryError> {
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GeometryError::NonFinite);
    }
    if ring.0.len() < 4 {
        return Err(GeometryError::TooFewPoints {
            ring: ring_idx,
            points: ring.0.len(),
        });
    }
    if ring.0.first() != ring.0.last() {
        return Err(GeometryError::UnclosedRing { ring: ring_idx });
    }
    Ok(())
}

/// Shoelace sum; twice the signed area of a closed ring.
fn ring_twice_area(ring: &LineString<f64>) -> f64 {
    ring.0
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum()
}

/// GeoJSON-style type name of a geometry.
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

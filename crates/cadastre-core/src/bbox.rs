//! Axis-aligned bounding boxes.

use geo::BoundingRect;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};

/// Axis-aligned envelope in dataset coordinates.
///
/// Intervals are closed: two boxes that share only an edge or a corner
/// intersect. Adjacency relies on this, since touching polygons have
/// touching envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Minimum x (west).
    pub min_x: f64,
    /// Minimum y (south).
    pub min_y: f64,
    /// Maximum x (east).
    pub max_x: f64,
    /// Maximum y (north).
    pub max_y: f64,
}

impl BBox {
    /// Create a box from its corners. Callers pass `min <= max`.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Envelope of a geometry, or `None` for an empty geometry.
    pub fn from_geometry(geom: &Geometry<f64>) -> Option<Self> {
        let rect = geom.bounding_rect()?;
        Some(Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Whether the two boxes share at least one point.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Whether all four bounds are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Horizontal extent.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Vertical extent.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// `[min_x, min_y, max_x, max_y]`, the serving-layer wire form.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

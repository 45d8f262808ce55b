//! GeoJSON encoding of feature geometry for the serving layer.

use geo_types::{Geometry, LineString, Polygon};
use serde_json::{json, Value};

/// Encode a polygonal geometry as a GeoJSON geometry object.
///
/// Non-polygonal geometries never reach a dataset; they encode as JSON
/// `null` should one be passed anyway.
pub fn geometry_to_value(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Polygon(poly) => json!({
            "type": "Polygon",
            "coordinates": polygon_coordinates(poly),
        }),
        Geometry::MultiPolygon(multi) => json!({
            "type": "MultiPolygon",
            "coordinates": multi.0.iter().map(polygon_coordinates).collect::<Vec<_>>(),
        }),
        _ => Value::Null,
    }
}

fn polygon_coordinates(poly: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .map(ring_coordinates)
        .collect()
}

fn ring_coordinates(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.0.iter().map(|c| [c.x, c.y]).collect()
}

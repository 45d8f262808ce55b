//! GeoJSON reader (RFC 7946, with the 2008 `crs` member honoured).

use crate::crs::parse_identifier;
use crate::raw::{DeclaredCrs, RawFeature, RawLayer};
use crate::readers::wkb::check_ring;
use cadastre_core::{GeometryError, IngestError, Properties, PropertyValue, SourceFormat};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use serde_json::{Map, Value};

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Parse a GeoJSON document into one layer.
pub(crate) fn read(data: &[u8]) -> Result<RawLayer, IngestError> {
    let text = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let root: Value = serde_json::from_slice(text)
        .map_err(|e| IngestError::format(format!("invalid JSON: {e}")))?;
    let obj = root
        .as_object()
        .ok_or_else(|| IngestError::format("GeoJSON root is not an object"))?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::format("GeoJSON root has no \"type\""))?;

    let mut layer = RawLayer::new(SourceFormat::GeoJson, declared_crs(obj));
    match kind {
        "FeatureCollection" => {
            let features = obj
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| IngestError::format("FeatureCollection has no \"features\" array"))?;
            for (idx, value) in features.iter().enumerate() {
                layer.features.push(feature(idx, value));
            }
        }
        "Feature" => layer.features.push(feature(0, &root)),
        t if GEOMETRY_TYPES.contains(&t) => layer.features.push(RawFeature {
            key: "#0".to_owned(),
            source_id: None,
            geometry: geometry(&root),
            properties: Properties::new(),
        }),
        other => {
            return Err(IngestError::format(format!(
                "unsupported GeoJSON type {other:?}"
            )))
        }
    }
    Ok(layer)
}

/// CRS of a GeoJSON root: legacy `crs` member, else RFC 7946 WGS84.
fn declared_crs(obj: &Map<String, Value>) -> DeclaredCrs {
    let Some(crs) = obj.get("crs") else {
        return DeclaredCrs::Epsg(4326);
    };
    if crs.is_null() {
        return DeclaredCrs::Undeclared;
    }
    let props = crs.get("properties");
    let found = match crs.get("type").and_then(Value::as_str) {
        Some("name") => props
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .and_then(parse_identifier),
        Some("EPSG") | Some("epsg") => props
            .and_then(|p| p.get("code"))
            .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
            .and_then(|c| u32::try_from(c).ok()),
        _ => None,
    };
    match found {
        Some(code) => DeclaredCrs::Epsg(code),
        None => DeclaredCrs::Unrecognized(crs.to_string()),
    }
}

fn feature(idx: usize, value: &Value) -> RawFeature {
    let source_id = value.get("id").map(PropertyValue::from_json);
    let key = match &source_id {
        Some(id) => format!("{id}"),
        None => format!("#{idx}"),
    };
    let Some(obj) = value.as_object() else {
        return RawFeature {
            key,
            source_id: None,
            geometry: Err(GeometryError::malformed("feature is not an object")),
            properties: Properties::new(),
        };
    };
    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .map(|p| {
            p.iter()
                .map(|(k, v)| (k.clone(), PropertyValue::from_json(v)))
                .collect()
        })
        .unwrap_or_default();
    let geometry = match obj.get("geometry") {
        None | Some(Value::Null) => Err(GeometryError::Empty),
        Some(g) => geometry(g),
    };
    RawFeature {
        key,
        source_id,
        geometry,
        properties,
    }
}

fn geometry(value: &Value) -> Result<Geometry<f64>, GeometryError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeometryError::malformed("geometry has no \"type\""))?;
    match kind {
        "Polygon" => polygon(coordinates(value)?).map(Geometry::Polygon),
        "MultiPolygon" => {
            let parts = array(coordinates(value)?, "MultiPolygon coordinates")?;
            if parts.is_empty() {
                return Err(GeometryError::Empty);
            }
            let polys = parts.iter().map(polygon).collect::<Result<Vec<_>, _>>()?;
            Ok(Geometry::MultiPolygon(MultiPolygon(polys)))
        }
        "GeometryCollection" => {
            let members = value
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| GeometryError::malformed("GeometryCollection has no geometries"))?;
            let mut polys = Vec::new();
            for member in members {
                match geometry(member)? {
                    Geometry::Polygon(p) => polys.push(p),
                    Geometry::MultiPolygon(m) => polys.extend(m.0),
                    other => {
                        return Err(GeometryError::UnsupportedType {
                            found: cadastre_core::feature::geometry_type_name(&other).to_owned(),
                        })
                    }
                }
            }
            if polys.is_empty() {
                return Err(GeometryError::Empty);
            }
            Ok(Geometry::MultiPolygon(MultiPolygon(polys)))
        }
        other if GEOMETRY_TYPES.contains(&other) => Err(GeometryError::UnsupportedType {
            found: other.to_owned(),
        }),
        other => Err(GeometryError::malformed(format!(
            "unknown geometry type {other:?}"
        ))),
    }
}

fn coordinates(value: &Value) -> Result<&Value, GeometryError> {
    value
        .get("coordinates")
        .ok_or_else(|| GeometryError::malformed("geometry has no \"coordinates\""))
}

fn array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, GeometryError> {
    value
        .as_array()
        .ok_or_else(|| GeometryError::malformed(format!("{what} is not an array")))
}

fn polygon(value: &Value) -> Result<Polygon<f64>, GeometryError> {
    let rings = array(value, "Polygon coordinates")?;
    if rings.is_empty() {
        return Err(GeometryError::Empty);
    }
    let mut out = Vec::with_capacity(rings.len());
    for (ring_idx, ring) in rings.iter().enumerate() {
        let positions = array(ring, "ring")?;
        let coords = positions
            .iter()
            .map(position)
            .collect::<Result<Vec<_>, _>>()?;
        check_ring(&coords, ring_idx)?;
        out.push(LineString(coords));
    }
    let mut rings = out.into_iter();
    let exterior = rings.next().ok_or(GeometryError::Empty)?;
    Ok(Polygon::new(exterior, rings.collect()))
}

fn position(value: &Value) -> Result<Coord<f64>, GeometryError> {
    let nums = array(value, "position")?;
    match (nums.first().and_then(Value::as_f64), nums.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(GeometryError::malformed(
            "position needs two numeric coordinates",
        )),
    }
}

//! KML reader: `Placemark` polygons with their names and extended data.

use crate::raw::{DeclaredCrs, RawFeature, RawLayer};
use crate::readers::wkb::check_ring;
use cadastre_core::{
    CancelToken, GeometryError, IngestError, Properties, PropertyValue, SourceFormat,
};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const CANCEL_POLL_INTERVAL: usize = 256;

/// Which text-bearing element we are inside.
#[derive(Clone, Debug, PartialEq)]
enum Capture {
    None,
    Name,
    Description,
    DataValue(String),
    SimpleData(String),
    Coordinates,
}

#[derive(Default)]
struct PolygonBuilder {
    outer: Option<Result<LineString<f64>, GeometryError>>,
    inner: Vec<Result<LineString<f64>, GeometryError>>,
    in_outer: bool,
}

#[derive(Default)]
struct PlacemarkBuilder {
    id: Option<String>,
    properties: Properties,
    polygons: Vec<Result<Polygon<f64>, GeometryError>>,
    other_geometry: Option<String>,
    current: Option<PolygonBuilder>,
}

impl PlacemarkBuilder {
    fn finish(self, index: usize) -> RawFeature {
        let key = self
            .id
            .clone()
            .unwrap_or_else(|| format!("placemark {}", index + 1));
        let geometry = if self.polygons.is_empty() {
            match self.other_geometry {
                Some(found) => Err(GeometryError::UnsupportedType { found }),
                None => Err(GeometryError::Empty),
            }
        } else {
            self.polygons
                .into_iter()
                .collect::<Result<Vec<_>, _>>()
                .map(|mut polys| {
                    if polys.len() == 1 {
                        Geometry::Polygon(polys.remove(0))
                    } else {
                        Geometry::MultiPolygon(MultiPolygon(polys))
                    }
                })
        };
        RawFeature {
            key,
            source_id: self.id.map(PropertyValue::String),
            geometry,
            properties: self.properties,
        }
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn parse_coordinates(text: &str, ring: usize) -> Result<LineString<f64>, GeometryError> {
    let mut coords = Vec::new();
    for tuple in text.split_ascii_whitespace() {
        let mut parts = tuple.split(',');
        let x = parts.next().and_then(|s| s.trim().parse::<f64>().ok());
        let y = parts.next().and_then(|s| s.trim().parse::<f64>().ok());
        match (x, y) {
            (Some(x), Some(y)) => coords.push(Coord { x, y }),
            _ => {
                return Err(GeometryError::malformed(format!(
                    "bad KML coordinate tuple {tuple:?}"
                )))
            }
        }
    }
    check_ring(&coords, ring)?;
    Ok(LineString(coords))
}

/// Parse a KML document into one layer. KML is always WGS84.
pub(crate) fn read(data: &[u8], cancel: &CancelToken) -> Result<RawLayer, IngestError> {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().trim_text(true);

    let mut layer = RawLayer::new(SourceFormat::Kml, DeclaredCrs::Epsg(4326));
    let mut saw_kml_root = false;
    let mut placemark: Option<PlacemarkBuilder> = None;
    let mut capture = Capture::None;
    let mut text = String::new();
    let mut document_name: Option<String> = None;
    let mut in_document_name = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            IngestError::format(format!(
                "invalid KML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let local = e.local_name();
                match local.as_ref() {
                    b"kml" => saw_kml_root = true,
                    b"Placemark" => {
                        if layer.features.len() % CANCEL_POLL_INTERVAL == 0 {
                            cancel.check()?;
                        }
                        placemark = Some(PlacemarkBuilder {
                            id: attribute(e, b"id"),
                            ..PlacemarkBuilder::default()
                        });
                    }
                    b"name" if placemark.is_some() => capture = Capture::Name,
                    b"name" if placemark.is_none() && document_name.is_none() => {
                        in_document_name = true
                    }
                    b"description" if placemark.is_some() => capture = Capture::Description,
                    b"Data" => {
                        if let Some(name) = attribute(e, b"name") {
                            capture = Capture::DataValue(name);
                        }
                    }
                    b"value" => {}
                    b"SimpleData" => {
                        if let Some(name) = attribute(e, b"name") {
                            capture = Capture::SimpleData(name);
                        }
                    }
                    b"Polygon" => {
                        if let Some(pm) = placemark.as_mut() {
                            pm.current = Some(PolygonBuilder::default());
                        }
                    }
                    b"outerBoundaryIs" => {
                        if let Some(poly) = placemark.as_mut().and_then(|p| p.current.as_mut()) {
                            poly.in_outer = true;
                        }
                    }
                    b"innerBoundaryIs" => {
                        if let Some(poly) = placemark.as_mut().and_then(|p| p.current.as_mut()) {
                            poly.in_outer = false;
                        }
                    }
                    b"coordinates" => {
                        if placemark.as_ref().is_some_and(|p| p.current.is_some()) {
                            capture = Capture::Coordinates;
                        }
                    }
                    other @ (b"Point" | b"LineString" | b"Model" | b"Track") => {
                        if let Some(pm) = placemark.as_mut() {
                            if pm.current.is_none() && pm.other_geometry.is_none() {
                                pm.other_geometry = Some(String::from_utf8_lossy(other).into_owned());
                            }
                        }
                    }
                    _ => {}
                }
                if is_empty {
                    // An empty element carries no text; close what it opened.
                    if matches!(capture, Capture::DataValue(_)) {
                        if local.as_ref() == b"Data" {
                            capture = Capture::None;
                        }
                    } else if capture != Capture::None {
                        finish_capture(&mut capture, &mut text, placemark.as_mut());
                    }
                    if local.as_ref() == b"Placemark" {
                        if let Some(pm) = placemark.take() {
                            let idx = layer.features.len();
                            layer.features.push(pm.finish(idx));
                        }
                    }
                }
            }
            Event::Text(ref t) => {
                if capture != Capture::None || in_document_name {
                    let s = t
                        .unescape()
                        .map_err(|e| IngestError::format(format!("invalid KML text: {e}")))?;
                    text.push_str(&s);
                }
            }
            Event::CData(ref c) => {
                if capture != Capture::None {
                    text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Event::End(ref e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"Placemark" => {
                        if let Some(pm) = placemark.take() {
                            let idx = layer.features.len();
                            layer.features.push(pm.finish(idx));
                        }
                        capture = Capture::None;
                        text.clear();
                    }
                    b"name" if in_document_name => {
                        document_name = Some(std::mem::take(&mut text).trim().to_owned());
                        in_document_name = false;
                    }
                    b"name" | b"description" | b"value" | b"SimpleData" | b"coordinates" => {
                        finish_capture(&mut capture, &mut text, placemark.as_mut());
                    }
                    b"Data" => capture = Capture::None,
                    b"Polygon" => {
                        if let Some(pm) = placemark.as_mut() {
                            if let Some(poly) = pm.current.take() {
                                pm.polygons.push(build_polygon(poly));
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_kml_root {
        return Err(IngestError::format("document has no <kml> root element"));
    }
    layer.layer = document_name.filter(|n| !n.is_empty());
    Ok(layer)
}

fn finish_capture(capture: &mut Capture, text: &mut String, placemark: Option<&mut PlacemarkBuilder>) {
    let value = std::mem::take(text);
    let taken = std::mem::replace(capture, Capture::None);
    let Some(pm) = placemark else {
        return;
    };
    match taken {
        Capture::None => {}
        Capture::Name => {
            pm.properties
                .insert("name".into(), PropertyValue::String(value.trim().to_owned()));
        }
        Capture::Description => {
            pm.properties.insert(
                "description".into(),
                PropertyValue::String(value.trim().to_owned()),
            );
        }
        Capture::DataValue(name) => {
            pm.properties
                .insert(name.clone(), PropertyValue::String(value.trim().to_owned()));
            // Stay inside <Data> until </Data>; the name stays bound.
            *capture = Capture::DataValue(name);
        }
        Capture::SimpleData(name) => {
            pm.properties
                .insert(name, PropertyValue::String(value.trim().to_owned()));
        }
        Capture::Coordinates => {
            if let Some(poly) = pm.current.as_mut() {
                if poly.in_outer {
                    let ring = parse_coordinates(&value, 0);
                    poly.outer = Some(ring);
                } else {
                    let ring = parse_coordinates(&value, poly.inner.len() + 1);
                    poly.inner.push(ring);
                }
            }
        }
    }
}

fn build_polygon(poly: PolygonBuilder) -> Result<Polygon<f64>, GeometryError> {
    let outer = poly.outer.ok_or(GeometryError::Empty)??;
    let inner = poly.inner.into_iter().collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(outer, inner))
}

//! ESRI shapefile reader: `.shp` geometry, `.dbf` attributes, `.prj`
//! projection and `.cpg` code page.

use crate::crs::parse_wkt;
use crate::raw::{DeclaredCrs, RawFeature, RawLayer};
use crate::readers::wkb::check_ring;
use cadastre_core::{
    CancelToken, GeometryError, IngestError, Properties, PropertyValue, SourceFormat, Warning,
};
use geo::Contains;
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};

const FILE_CODE: i32 = 9994;
const HEADER_LEN: usize = 100;
const RECORD_HEADER_LEN: usize = 8;
const CANCEL_POLL_INTERVAL: usize = 256;

const SHAPE_NULL: i32 = 0;
const SHAPE_POLYGON: i32 = 5;
const SHAPE_POLYGON_Z: i32 = 15;
const SHAPE_POLYGON_M: i32 = 25;

/// The files of one shapefile set, sidecars optional.
#[derive(Clone, Debug, Default)]
pub(crate) struct ShapefileParts {
    pub shp: Vec<u8>,
    pub dbf: Option<Vec<u8>>,
    pub prj: Option<Vec<u8>>,
    pub cpg: Option<Vec<u8>>,
}

/// Decode a shapefile set into one layer.
pub(crate) fn read(parts: &ShapefileParts, cancel: &CancelToken) -> Result<RawLayer, IngestError> {
    let shp = &parts.shp;
    if shp.len() < HEADER_LEN || be_i32(shp, 0) != Some(FILE_CODE) {
        return Err(IngestError::format("not a shapefile: bad .shp header"));
    }

    let crs = match &parts.prj {
        Some(prj) => {
            let wkt = String::from_utf8_lossy(prj);
            match parse_wkt(&wkt) {
                Some(code) => DeclaredCrs::Epsg(code),
                None => DeclaredCrs::Unrecognized(wkt.trim().to_owned()),
            }
        }
        None => DeclaredCrs::Undeclared,
    };
    let mut layer = RawLayer::new(SourceFormat::Shapefile, crs);

    let table = match &parts.dbf {
        Some(dbf) => match DbfTable::parse(dbf, Encoding::from_cpg(parts.cpg.as_deref())) {
            Ok(table) => Some(table),
            Err(reason) => {
                layer.warnings.push(Warning::source(format!(
                    "attribute table unreadable ({reason}); features have no attributes"
                )));
                None
            }
        },
        None => {
            layer.warnings.push(Warning::source(
                "no .dbf file; features have no attributes",
            ));
            None
        }
    };

    let mut pos = HEADER_LEN;
    let mut record = 0usize;
    while pos + RECORD_HEADER_LEN <= shp.len() {
        if record % CANCEL_POLL_INTERVAL == 0 {
            cancel.check()?;
        }
        let content_words = be_i32(shp, pos + 4).unwrap_or(-1);
        let content_len = usize::try_from(content_words).map(|w| w * 2).ok();
        let start = pos + RECORD_HEADER_LEN;
        let Some(end) = content_len.map(|l| start + l).filter(|&e| e <= shp.len()) else {
            layer.warnings.push(Warning::source(format!(
                "shapefile truncated in record {}; remaining records ignored",
                record + 1
            )));
            break;
        };
        let content = &shp[start..end];
        pos = end;

        let row = table.as_ref().and_then(|t| t.rows.get(record));
        record += 1;
        if matches!(row, Some(DbfRow::Deleted)) {
            continue;
        }
        let properties = match row {
            Some(DbfRow::Live(props)) => props.clone(),
            _ => Properties::new(),
        };
        layer.features.push(RawFeature {
            key: format!("record {record}"),
            source_id: None,
            geometry: shape(content),
            properties,
        });
    }

    if let Some(table) = &table {
        if table.rows.len() != record {
            layer.warnings.push(Warning::source(format!(
                ".shp has {record} records but .dbf has {}; attributes matched by position",
                table.rows.len()
            )));
        }
        layer.warnings.extend(table.warnings.iter().cloned());
    }
    Ok(layer)
}

fn be_i32(buf: &[u8], at: usize) -> Option<i32> {
    let b = buf.get(at..at + 4)?;
    Some(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_i32(buf: &[u8], at: usize) -> Option<i32> {
    let b = buf.get(at..at + 4)?;
    Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_f64(buf: &[u8], at: usize) -> Option<f64> {
    let b: [u8; 8] = buf.get(at..at + 8)?.try_into().ok()?;
    Some(f64::from_le_bytes(b))
}

/// Decode one record's content.
fn shape(content: &[u8]) -> Result<Geometry<f64>, GeometryError> {
    let truncated = || GeometryError::malformed("shape record truncated");
    let kind = le_i32(content, 0).ok_or_else(truncated)?;
    match kind {
        SHAPE_NULL => return Err(GeometryError::Empty),
        SHAPE_POLYGON | SHAPE_POLYGON_Z | SHAPE_POLYGON_M => {}
        other => {
            return Err(GeometryError::UnsupportedType {
                found: shape_type_name(other).to_owned(),
            })
        }
    }
    // Skip the 32-byte record box.
    let n_parts = usize::try_from(le_i32(content, 36).ok_or_else(truncated)?)
        .map_err(|_| GeometryError::malformed("negative part count"))?;
    let n_points = usize::try_from(le_i32(content, 40).ok_or_else(truncated)?)
        .map_err(|_| GeometryError::malformed("negative point count"))?;
    let parts_at = 44;
    let points_at = parts_at + 4 * n_parts;
    if content.len() < points_at + 16 * n_points {
        return Err(truncated());
    }
    if n_parts == 0 || n_points == 0 {
        return Err(GeometryError::Empty);
    }

    let mut starts = Vec::with_capacity(n_parts + 1);
    for i in 0..n_parts {
        let s = le_i32(content, parts_at + 4 * i).ok_or_else(truncated)?;
        let s = usize::try_from(s).map_err(|_| GeometryError::malformed("negative part index"))?;
        starts.push(s);
    }
    starts.push(n_points);
    if starts.windows(2).any(|w| w[0] > w[1]) {
        return Err(GeometryError::malformed("part indices out of order"));
    }

    let mut rings = Vec::with_capacity(n_parts);
    for (ring_idx, w) in starts.windows(2).enumerate() {
        let coords: Vec<Coord<f64>> = (w[0]..w[1])
            .map(|i| {
                let at = points_at + 16 * i;
                Coord {
                    x: le_f64(content, at).unwrap_or(f64::NAN),
                    y: le_f64(content, at + 8).unwrap_or(f64::NAN),
                }
            })
            .collect();
        check_ring(&coords, ring_idx)?;
        rings.push(LineString(coords));
    }
    Ok(assemble_rings(rings))
}

fn shape_type_name(code: i32) -> &'static str {
    match code {
        1 | 11 | 21 => "Point",
        3 | 13 | 23 => "LineString",
        8 | 18 | 28 => "MultiPoint",
        31 => "MultiPatch",
        _ => "unknown shape type",
    }
}

/// Twice the signed area; negative for clockwise rings.
fn signed_area2(ring: &LineString<f64>) -> f64 {
    ring.0
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum()
}

/// Group rings into polygons: clockwise rings are shells, counter-clockwise
/// rings are holes of the first shell containing them. A hole no shell
/// contains is kept as a shell of its own.
fn assemble_rings(rings: Vec<LineString<f64>>) -> Geometry<f64> {
    let mut shells: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    let mut holes = Vec::new();
    for ring in rings {
        if signed_area2(&ring) < 0.0 {
            shells.push((ring, Vec::new()));
        } else {
            holes.push(ring);
        }
    }
    for hole in holes {
        let probe = Point(hole.0[0]);
        let owner = shells
            .iter_mut()
            .find(|(shell, _)| Polygon::new(shell.clone(), vec![]).contains(&probe));
        match owner {
            Some((_, inner)) => inner.push(hole),
            None => shells.push((hole, Vec::new())),
        }
    }
    let mut polys: Vec<Polygon<f64>> = shells
        .into_iter()
        .map(|(shell, inner)| Polygon::new(shell, inner))
        .collect();
    if polys.len() == 1 {
        Geometry::Polygon(polys.remove(0))
    } else {
        Geometry::MultiPolygon(MultiPolygon(polys))
    }
}

// ── dBase ───────────────────────────────────────────────────────

/// Text encoding of `.dbf` character fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Latin1,
    /// No `.cpg`: UTF-8 where valid, Latin-1 otherwise.
    Sniff,
}

impl Encoding {
    fn from_cpg(cpg: Option<&[u8]>) -> Self {
        let Some(cpg) = cpg else {
            return Self::Sniff;
        };
        let name = String::from_utf8_lossy(cpg).trim().to_ascii_uppercase();
        match name.replace(['-', '_'], "").as_str() {
            "UTF8" | "65001" => Self::Utf8,
            _ => Self::Latin1,
        }
    }

    fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Sniff => match std::str::from_utf8(bytes) {
                Ok(s) => s.to_owned(),
                Err(_) => Self::Latin1.decode(bytes),
            },
        }
    }
}

#[derive(Clone, Debug)]
struct DbfField {
    name: String,
    kind: u8,
    length: usize,
}

#[derive(Clone, Debug)]
enum DbfRow {
    Live(Properties),
    Deleted,
}

struct DbfTable {
    rows: Vec<DbfRow>,
    warnings: Vec<Warning>,
}

impl DbfTable {
    fn parse(dbf: &[u8], encoding: Encoding) -> Result<Self, String> {
        if dbf.len() < 32 {
            return Err("header truncated".into());
        }
        let n_records = u32::from_le_bytes([dbf[4], dbf[5], dbf[6], dbf[7]]) as usize;
        let header_len = usize::from(u16::from_le_bytes([dbf[8], dbf[9]]));
        let record_len = usize::from(u16::from_le_bytes([dbf[10], dbf[11]]));

        let mut fields = Vec::new();
        let mut at = 32;
        while at + 32 <= dbf.len() && dbf[at] != 0x0D && at + 32 <= header_len {
            let desc = &dbf[at..at + 32];
            let name_end = desc[..11].iter().position(|&b| b == 0).unwrap_or(11);
            fields.push(DbfField {
                name: encoding.decode(&desc[..name_end]).trim().to_owned(),
                kind: desc[11].to_ascii_uppercase(),
                length: usize::from(desc[16]),
            });
            at += 32;
        }
        let declared: usize = 1 + fields.iter().map(|f| f.length).sum::<usize>();
        if record_len < declared {
            return Err(format!(
                "record length {record_len} shorter than its fields ({declared})"
            ));
        }

        let mut rows = Vec::with_capacity(n_records);
        let mut warnings = Vec::new();
        for r in 0..n_records {
            let start = header_len + r * record_len;
            let Some(rec) = dbf.get(start..start + record_len) else {
                warnings.push(Warning::source(format!(
                    ".dbf truncated after {r} of {n_records} records"
                )));
                break;
            };
            if rec[0] == b'*' {
                rows.push(DbfRow::Deleted);
                continue;
            }
            let mut props = Properties::new();
            let mut off = 1;
            for field in &fields {
                let raw = &rec[off..off + field.length];
                off += field.length;
                props.insert(field.name.clone(), field_value(field.kind, raw, encoding));
            }
            rows.push(DbfRow::Live(props));
        }
        Ok(Self { rows, warnings })
    }
}

fn field_value(kind: u8, raw: &[u8], encoding: Encoding) -> PropertyValue {
    let text = encoding.decode(raw);
    let trimmed = text.trim_matches(|c: char| c == ' ' || c == '\0');
    match kind {
        b'N' | b'F' => {
            if trimmed.is_empty() || trimmed.chars().all(|c| c == '*') {
                PropertyValue::Null
            } else {
                trimmed
                    .parse::<f64>()
                    .map(PropertyValue::Number)
                    .unwrap_or_else(|_| PropertyValue::String(trimmed.to_owned()))
            }
        }
        b'L' => match trimmed.chars().next() {
            Some('T' | 't' | 'Y' | 'y') => PropertyValue::Bool(true),
            Some('F' | 'f' | 'N' | 'n') => PropertyValue::Bool(false),
            _ => PropertyValue::Null,
        },
        b'D' => {
            if trimmed.len() == 8 && trimmed.chars().all(|c| c.is_ascii_digit()) {
                PropertyValue::String(format!(
                    "{}-{}-{}",
                    &trimmed[..4],
                    &trimmed[4..6],
                    &trimmed[6..]
                ))
            } else if trimmed.is_empty() {
                PropertyValue::Null
            } else {
                PropertyValue::String(trimmed.to_owned())
            }
        }
        _ => {
            if trimmed.is_empty() {
                PropertyValue::Null
            } else {
                PropertyValue::String(trimmed.to_owned())
            }
        }
    }
}

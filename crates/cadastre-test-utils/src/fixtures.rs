//! Byte-level builders for every source format the ingestor reads.
//!
//! Each builder produces exactly what a user would upload: a GeoJSON
//! document, a zip archive, a GeoPackage file, a shapefile set, or a KML
//! document. Panics on I/O failure; these are test helpers only.

use cadastre_core::geojson::geometry_to_value;
use cadastre_core::Dataset;
use geo_types::{Geometry, LineString, Polygon};
use std::io::{Cursor, Write};

// ── GeoJSON ─────────────────────────────────────────────────────

/// `FeatureCollection` text for `dataset`, ids and properties included.
pub fn feature_collection(dataset: &Dataset) -> String {
    let features: Vec<serde_json::Value> = dataset
        .iter()
        .map(|f| {
            serde_json::json!({
                "type": "Feature",
                "id": f.id().0,
                "geometry": geometry_to_value(f.geometry()),
                "properties": f.properties(),
            })
        })
        .collect();
    serde_json::json!({ "type": "FeatureCollection", "features": features }).to_string()
}

// ── Zip ─────────────────────────────────────────────────────────

/// Deflated zip archive with the given `(name, contents)` entries in order.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        writer
            .start_file(*name, options)
            .expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

// ── WKB / GeoPackage ────────────────────────────────────────────

fn push_ring_le(out: &mut Vec<u8>, ring: &LineString<f64>) {
    out.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
    for c in &ring.0 {
        out.extend_from_slice(&c.x.to_le_bytes());
        out.extend_from_slice(&c.y.to_le_bytes());
    }
}

/// Little-endian ISO WKB for a polygon.
pub fn wkb_polygon(poly: &Polygon<f64>) -> Vec<u8> {
    let mut out = vec![1u8];
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&(1 + poly.interiors().len() as u32).to_le_bytes());
    push_ring_le(&mut out, poly.exterior());
    for hole in poly.interiors() {
        push_ring_le(&mut out, hole);
    }
    out
}

/// Little-endian ISO WKB for a multipolygon.
pub fn wkb_multipolygon(polys: &[Polygon<f64>]) -> Vec<u8> {
    let mut out = vec![1u8];
    out.extend_from_slice(&6u32.to_le_bytes());
    out.extend_from_slice(&(polys.len() as u32).to_le_bytes());
    for poly in polys {
        out.extend(wkb_polygon(poly));
    }
    out
}

/// GeoPackage binary: `GP` header without envelope, then WKB.
pub fn gpkg_blob(srs_id: i32, wkb: &[u8]) -> Vec<u8> {
    let mut out = vec![b'G', b'P', 0, 0b0000_0001];
    out.extend_from_slice(&srs_id.to_le_bytes());
    out.extend_from_slice(wkb);
    out
}

/// One feature table of a [`geopackage`].
#[derive(Debug, Clone)]
pub struct GpkgLayer {
    /// SQLite table name.
    pub table: String,
    /// `(fid, geometry, name attribute)` rows.
    pub rows: Vec<(i64, Geometry<f64>, String)>,
}

impl GpkgLayer {
    /// Layer of polygons with fids `1..` and names `parcel-<fid>`.
    pub fn polygons(table: &str, polys: Vec<Polygon<f64>>) -> Self {
        let rows = polys
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let fid = i as i64 + 1;
                (fid, Geometry::Polygon(p), format!("parcel-{fid}"))
            })
            .collect();
        Self {
            table: table.to_owned(),
            rows,
        }
    }
}

fn wkb_for(geometry: &Geometry<f64>) -> Vec<u8> {
    match geometry {
        Geometry::Polygon(p) => wkb_polygon(p),
        Geometry::MultiPolygon(m) => wkb_multipolygon(&m.0),
        Geometry::Point(p) => {
            let mut out = vec![1u8];
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&p.x().to_le_bytes());
            out.extend_from_slice(&p.y().to_le_bytes());
            out
        }
        other => panic!("fixture cannot encode {other:?}"),
    }
}

/// A complete GeoPackage file with `layers` registered in `gpkg_contents`
/// order, every geometry tagged with `srs_id` (an EPSG code).
pub fn geopackage(srs_id: i32, layers: &[GpkgLayer]) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("fixture.gpkg");
    {
        let conn = rusqlite::Connection::open(&path).expect("create gpkg");
        conn.execute_batch(
            "CREATE TABLE gpkg_spatial_ref_sys (
                 srs_name TEXT NOT NULL,
                 srs_id INTEGER PRIMARY KEY,
                 organization TEXT NOT NULL,
                 organization_coordsys_id INTEGER NOT NULL,
                 definition TEXT NOT NULL,
                 description TEXT
             );
             CREATE TABLE gpkg_contents (
                 table_name TEXT NOT NULL PRIMARY KEY,
                 data_type TEXT NOT NULL,
                 identifier TEXT UNIQUE,
                 description TEXT DEFAULT '',
                 last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                 min_x DOUBLE, min_y DOUBLE, max_x DOUBLE, max_y DOUBLE,
                 srs_id INTEGER
             );
             CREATE TABLE gpkg_geometry_columns (
                 table_name TEXT NOT NULL,
                 column_name TEXT NOT NULL,
                 geometry_type_name TEXT NOT NULL,
                 srs_id INTEGER NOT NULL,
                 z TINYINT NOT NULL,
                 m TINYINT NOT NULL,
                 CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name)
             );
             INSERT INTO gpkg_spatial_ref_sys VALUES
                 ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', NULL),
                 ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', NULL);",
        )
        .expect("gpkg schema");
        conn.execute(
            "INSERT OR IGNORE INTO gpkg_spatial_ref_sys VALUES (?1, ?2, 'EPSG', ?2, 'fixture', NULL)",
            rusqlite::params![format!("EPSG:{srs_id}"), srs_id],
        )
        .expect("gpkg srs");

        for layer in layers {
            conn.execute(
                "INSERT INTO gpkg_contents (table_name, data_type, identifier, srs_id)
                 VALUES (?1, 'features', ?1, ?2)",
                rusqlite::params![layer.table, srs_id],
            )
            .expect("gpkg contents");
            conn.execute(
                "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', 'GEOMETRY', ?2, 0, 0)",
                rusqlite::params![layer.table, srs_id],
            )
            .expect("gpkg geometry column");
            conn.execute_batch(&format!(
                "CREATE TABLE \"{}\" (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB, name TEXT)",
                layer.table
            ))
            .expect("gpkg feature table");
            let insert = format!(
                "INSERT INTO \"{}\" (fid, geom, name) VALUES (?1, ?2, ?3)",
                layer.table
            );
            for (fid, geometry, name) in &layer.rows {
                let blob = gpkg_blob(srs_id, &wkb_for(geometry));
                conn.execute(&insert, rusqlite::params![fid, blob, name])
                    .expect("gpkg feature row");
            }
        }
    }
    std::fs::read(&path).expect("read gpkg")
}

// ── Shapefile ───────────────────────────────────────────────────

/// The files of one shapefile set.
#[derive(Debug, Clone)]
pub struct ShapefileSet {
    /// Main geometry file.
    pub shp: Vec<u8>,
    /// Record offset index.
    pub shx: Vec<u8>,
    /// dBase attribute table.
    pub dbf: Vec<u8>,
    /// WKT projection, if any.
    pub prj: Option<String>,
    /// Code page declaration, if any.
    pub cpg: Option<String>,
}

impl ShapefileSet {
    /// `(name, bytes)` entries for a zip, named `<stem>.shp` etc.
    pub fn entries(&self, stem: &str) -> Vec<(String, Vec<u8>)> {
        let mut out = vec![
            (format!("{stem}.shp"), self.shp.clone()),
            (format!("{stem}.shx"), self.shx.clone()),
            (format!("{stem}.dbf"), self.dbf.clone()),
        ];
        if let Some(prj) = &self.prj {
            out.push((format!("{stem}.prj"), prj.clone().into_bytes()));
        }
        if let Some(cpg) = &self.cpg {
            out.push((format!("{stem}.cpg"), cpg.clone().into_bytes()));
        }
        out
    }

    /// The set zipped under `stem`.
    pub fn zip(&self, stem: &str) -> Vec<u8> {
        let entries = self.entries(stem);
        let borrowed: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(n, d)| (n.as_str(), d.as_slice()))
            .collect();
        zip_archive(&borrowed)
    }
}

/// One attribute row: `NAME` (character) and `CODE` (numeric) columns.
#[derive(Debug, Clone)]
pub struct DbfRow {
    /// Raw `NAME` bytes in the table's code page.
    pub name: Vec<u8>,
    /// `CODE` value.
    pub code: i64,
    /// Marked deleted in the table.
    pub deleted: bool,
}

impl DbfRow {
    /// Live row with an ASCII/UTF-8 name.
    pub fn new(name: &str, code: i64) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            code,
            deleted: false,
        }
    }
}

/// Builder for [`ShapefileSet`]s of Polygon (type 5) records.
#[derive(Debug, Clone, Default)]
pub struct ShapefileBuilder {
    shapes: Vec<Vec<Polygon<f64>>>,
    rows: Vec<DbfRow>,
    prj: Option<String>,
    cpg: Option<String>,
}

const NAME_LEN: usize = 24;
const CODE_LEN: usize = 10;

fn signed_twice_area(ring: &LineString<f64>) -> f64 {
    ring.0
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum()
}

/// Ring coordinates in the requested winding.
fn oriented(ring: &LineString<f64>, clockwise: bool) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = ring.0.iter().map(|c| (c.x, c.y)).collect();
    let is_cw = signed_twice_area(ring) < 0.0;
    if is_cw != clockwise {
        pts.reverse();
    }
    pts
}

impl ShapefileBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record made of one or more polygons with its attribute row.
    pub fn record(mut self, polys: Vec<Polygon<f64>>, row: DbfRow) -> Self {
        self.shapes.push(polys);
        self.rows.push(row);
        self
    }

    /// Attach a `.prj`.
    pub fn prj(mut self, wkt: &str) -> Self {
        self.prj = Some(wkt.to_owned());
        self
    }

    /// Attach a `.cpg`.
    pub fn cpg(mut self, code_page: &str) -> Self {
        self.cpg = Some(code_page.to_owned());
        self
    }

    /// Encode the set.
    pub fn build(&self) -> ShapefileSet {
        let mut contents = Vec::with_capacity(self.shapes.len());
        let mut bounds = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        for polys in &self.shapes {
            let mut parts: Vec<Vec<(f64, f64)>> = Vec::new();
            for poly in polys {
                parts.push(oriented(poly.exterior(), true));
                for hole in poly.interiors() {
                    parts.push(oriented(hole, false));
                }
            }
            let mut bbox = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
            for &(x, y) in parts.iter().flatten() {
                bbox[0] = bbox[0].min(x);
                bbox[1] = bbox[1].min(y);
                bbox[2] = bbox[2].max(x);
                bbox[3] = bbox[3].max(y);
            }
            bounds[0] = bounds[0].min(bbox[0]);
            bounds[1] = bounds[1].min(bbox[1]);
            bounds[2] = bounds[2].max(bbox[2]);
            bounds[3] = bounds[3].max(bbox[3]);

            let mut c = Vec::new();
            c.extend_from_slice(&5i32.to_le_bytes());
            for v in bbox {
                c.extend_from_slice(&v.to_le_bytes());
            }
            let n_points: usize = parts.iter().map(Vec::len).sum();
            c.extend_from_slice(&(parts.len() as i32).to_le_bytes());
            c.extend_from_slice(&(n_points as i32).to_le_bytes());
            let mut start = 0i32;
            for part in &parts {
                c.extend_from_slice(&start.to_le_bytes());
                start += part.len() as i32;
            }
            for &(x, y) in parts.iter().flatten() {
                c.extend_from_slice(&x.to_le_bytes());
                c.extend_from_slice(&y.to_le_bytes());
            }
            contents.push(c);
        }
        if self.shapes.is_empty() {
            bounds = [0.0; 4];
        }

        let mut shp = Vec::new();
        let mut shx = Vec::new();
        let shp_len = 100 + contents.iter().map(|c| 8 + c.len()).sum::<usize>();
        let shx_len = 100 + 8 * contents.len();
        shp.extend(shape_header(shp_len, bounds));
        shx.extend(shape_header(shx_len, bounds));
        for (n, c) in contents.iter().enumerate() {
            let offset_words = (shp.len() / 2) as i32;
            let len_words = (c.len() / 2) as i32;
            shp.extend_from_slice(&(n as i32 + 1).to_be_bytes());
            shp.extend_from_slice(&len_words.to_be_bytes());
            shp.extend_from_slice(c);
            shx.extend_from_slice(&offset_words.to_be_bytes());
            shx.extend_from_slice(&len_words.to_be_bytes());
        }

        ShapefileSet {
            shp,
            shx,
            dbf: self.dbf(),
            prj: self.prj.clone(),
            cpg: self.cpg.clone(),
        }
    }

    fn dbf(&self) -> Vec<u8> {
        let fields: [(&str, u8, usize); 2] = [("NAME", b'C', NAME_LEN), ("CODE", b'N', CODE_LEN)];
        let header_len = 32 + 32 * fields.len() + 1;
        let record_len = 1 + NAME_LEN + CODE_LEN;

        let mut out = vec![0x03, 124, 1, 1];
        out.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
        out.extend_from_slice(&(record_len as u16).to_le_bytes());
        out.resize(32, 0);
        for (name, kind, len) in fields {
            let mut desc = [0u8; 32];
            desc[..name.len()].copy_from_slice(name.as_bytes());
            desc[11] = kind;
            desc[16] = len as u8;
            out.extend_from_slice(&desc);
        }
        out.push(0x0D);
        for row in &self.rows {
            out.push(if row.deleted { b'*' } else { b' ' });
            let mut name = row.name.clone();
            name.resize(NAME_LEN, b' ');
            out.extend_from_slice(&name[..NAME_LEN]);
            out.extend_from_slice(format!("{:>width$}", row.code, width = CODE_LEN).as_bytes());
        }
        out.push(0x1A);
        out
    }
}

fn shape_header(total_len: usize, bounds: [f64; 4]) -> Vec<u8> {
    let mut h = Vec::with_capacity(100);
    h.extend_from_slice(&9994i32.to_be_bytes());
    h.extend_from_slice(&[0u8; 20]);
    h.extend_from_slice(&((total_len / 2) as i32).to_be_bytes());
    h.extend_from_slice(&1000i32.to_le_bytes());
    h.extend_from_slice(&5i32.to_le_bytes());
    for v in bounds {
        h.extend_from_slice(&v.to_le_bytes());
    }
    h.extend_from_slice(&[0u8; 32]);
    h
}

// ── KML ─────────────────────────────────────────────────────────

fn kml_coords(ring: &LineString<f64>) -> String {
    ring.0
        .iter()
        .map(|c| format!("{},{},0", c.x, c.y))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `<Polygon>` element text.
pub fn kml_polygon(poly: &Polygon<f64>) -> String {
    let mut s = format!(
        "<Polygon><outerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></outerBoundaryIs>",
        kml_coords(poly.exterior())
    );
    for hole in poly.interiors() {
        s.push_str(&format!(
            "<innerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></innerBoundaryIs>",
            kml_coords(hole)
        ));
    }
    s.push_str("</Polygon>");
    s
}

/// KML document with one `Placemark` per `(id attribute, name, polygon)`.
pub fn kml_document(placemarks: &[(Option<&str>, &str, Polygon<f64>)]) -> String {
    let mut body = String::new();
    for (id, name, poly) in placemarks {
        let id_attr = id.map(|id| format!(" id=\"{id}\"")).unwrap_or_default();
        body.push_str(&format!(
            "<Placemark{id_attr}><name>{name}</name>{}</Placemark>",
            kml_polygon(poly)
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <kml xmlns=\"http://www.opengis.net/kml/2.2\"><Document>{body}</Document></kml>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit_square;

    #[test]
    fn shapefile_header_lengths_match() {
        let set = ShapefileBuilder::new()
            .record(vec![unit_square(0.0, 0.0)], DbfRow::new("a", 1))
            .build();
        let words = i32::from_be_bytes(set.shp[24..28].try_into().unwrap());
        assert_eq!(words as usize * 2, set.shp.len());
        assert_eq!(set.shx.len(), 108);
        assert_eq!(*set.dbf.last().unwrap(), 0x1A);
    }

    #[test]
    fn zip_archive_lists_entries() {
        let bytes = zip_archive(&[("a.txt", &b"hello"[..]), ("b/c.txt", &b"world"[..])]);
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn wkb_polygon_layout() {
        let wkb = wkb_polygon(&unit_square(0.0, 0.0));
        assert_eq!(wkb[0], 1);
        assert_eq!(u32::from_le_bytes(wkb[1..5].try_into().unwrap()), 3);
        assert_eq!(wkb.len(), 1 + 4 + 4 + 4 + 5 * 16);
    }
}

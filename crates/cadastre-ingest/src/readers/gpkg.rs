//! OGC GeoPackage reader over a read-only SQLite connection.

use crate::crs::parse_wkt;
use crate::raw::{DeclaredCrs, RawFeature, RawLayer};
use crate::readers::wkb;
use cadastre_core::{
    CancelToken, GeometryError, IngestError, Properties, PropertyValue, SourceFormat, Warning,
};
use geo_types::Geometry;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::io::Write;

const CANCEL_POLL_INTERVAL: usize = 256;

/// Read the first feature table of a GeoPackage held in memory.
///
/// SQLite needs a file, so the bytes are spilled to a temporary file that
/// is removed when this returns.
pub(crate) fn read(data: &[u8], cancel: &CancelToken) -> Result<RawLayer, IngestError> {
    let mut file = tempfile::Builder::new()
        .prefix("cadastre-")
        .suffix(".gpkg")
        .tempfile()?;
    file.write_all(data)?;
    file.flush()?;
    let conn = Connection::open_with_flags(
        file.path(),
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(not_a_geopackage)?;
    read_connection(&conn, cancel)
}

fn not_a_geopackage(e: rusqlite::Error) -> IngestError {
    IngestError::format(format!("not a readable GeoPackage: {e}"))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn read_connection(conn: &Connection, cancel: &CancelToken) -> Result<RawLayer, IngestError> {
    let tables: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT table_name FROM gpkg_contents WHERE data_type = 'features' ORDER BY rowid")
            .map_err(not_a_geopackage)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(not_a_geopackage)?;
        rows.collect::<Result<_, _>>().map_err(not_a_geopackage)?
    };
    let Some(table) = tables.first().cloned() else {
        return Err(IngestError::format("GeoPackage has no feature tables"));
    };

    let (geom_column, srs_id): (String, i64) = conn
        .query_row(
            "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
            [&table],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| {
            IngestError::format(format!("feature table {table:?} has no geometry column: {e}"))
        })?;

    let mut layer = RawLayer::new(SourceFormat::GeoPackage, srs(conn, srs_id)?);
    layer.layer = Some(table.clone());
    if tables.len() > 1 {
        layer.warnings.push(Warning::source(format!(
            "GeoPackage has {} feature tables; loaded {table:?}, ignored {}",
            tables.len(),
            tables[1..].join(", ")
        )));
    }

    let pk_column = primary_key(conn, &table)?;
    let sql = format!("SELECT * FROM {}", quote_ident(&table));
    let mut stmt = conn.prepare(&sql).map_err(not_a_geopackage)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| (*s).to_owned()).collect();
    let mut rows = stmt.query([]).map_err(not_a_geopackage)?;

    let mut n = 0usize;
    while let Some(row) = rows.next().map_err(not_a_geopackage)? {
        if n % CANCEL_POLL_INTERVAL == 0 {
            cancel.check()?;
        }
        n += 1;
        let mut properties = Properties::new();
        let mut source_id = None;
        let mut geometry = Err(GeometryError::Empty);
        for (idx, name) in columns.iter().enumerate() {
            let value = row.get_ref(idx).map_err(not_a_geopackage)?;
            if *name == geom_column {
                geometry = match value {
                    ValueRef::Blob(blob) => decode_blob(blob),
                    ValueRef::Null => Err(GeometryError::Empty),
                    _ => Err(GeometryError::malformed("geometry column is not a blob")),
                };
            } else if Some(name) == pk_column.as_ref() {
                source_id = Some(property(value));
            } else {
                properties.insert(name.clone(), property(value));
            }
        }
        let key = match &source_id {
            Some(id) => format!("{table}:{id}"),
            None => format!("{table} row {n}"),
        };
        layer.features.push(RawFeature {
            key,
            source_id,
            geometry,
            properties,
        });
    }
    Ok(layer)
}

fn srs(conn: &Connection, srs_id: i64) -> Result<DeclaredCrs, IngestError> {
    let row: Option<(String, i64, String)> = conn
        .query_row(
            "SELECT organization, organization_coordsys_id, definition
             FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            [srs_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(not_a_geopackage)?;
    let Some((org, org_id, definition)) = row else {
        return Ok(DeclaredCrs::Unrecognized(format!("srs_id {srs_id}")));
    };
    if org.eq_ignore_ascii_case("EPSG") {
        if let Ok(code) = u32::try_from(org_id) {
            return Ok(DeclaredCrs::Epsg(code));
        }
    }
    if srs_id == 0 || srs_id == -1 || definition.trim().eq_ignore_ascii_case("undefined") {
        return Ok(DeclaredCrs::Undeclared);
    }
    Ok(match parse_wkt(&definition) {
        Some(code) => DeclaredCrs::Epsg(code),
        None => DeclaredCrs::Unrecognized(definition),
    })
}

fn primary_key(conn: &Connection, table: &str) -> Result<Option<String>, IngestError> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql).map_err(not_a_geopackage)?;
    let cols = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(5)?)))
        .map_err(not_a_geopackage)?;
    for col in cols {
        let (name, pk) = col.map_err(not_a_geopackage)?;
        if pk > 0 {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

fn property(value: ValueRef<'_>) -> PropertyValue {
    match value {
        ValueRef::Null => PropertyValue::Null,
        ValueRef::Integer(i) => PropertyValue::Number(i as f64),
        ValueRef::Real(f) => PropertyValue::Number(f),
        ValueRef::Text(t) => PropertyValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => PropertyValue::String(format!("<{} byte blob>", b.len())),
    }
}

/// Decode a GeoPackage geometry blob: `GP` header, optional envelope, WKB.
pub(crate) fn decode_blob(blob: &[u8]) -> Result<Geometry<f64>, GeometryError> {
    if blob.len() < 8 || &blob[..2] != b"GP" {
        return Err(GeometryError::malformed("missing GeoPackage blob header"));
    }
    let flags = blob[3];
    if flags & 0b0001_0000 != 0 {
        return Err(GeometryError::Empty);
    }
    let envelope_len = match (flags >> 1) & 0b111 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        other => {
            return Err(GeometryError::malformed(format!(
                "invalid envelope indicator {other}"
            )))
        }
    };
    let wkb_at = 8 + envelope_len;
    let body = blob
        .get(wkb_at..)
        .ok_or_else(|| GeometryError::malformed("GeoPackage blob truncated"))?;
    wkb::decode(body)
}

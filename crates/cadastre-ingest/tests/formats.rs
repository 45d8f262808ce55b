//! End-to-end ingest of each supported format.

use cadastre_core::{Crs, FeatureId, IngestError, PropertyValue, SourceFormat, WarningScope};
use cadastre_ingest::{extract, FormatHint, Source};
use cadastre_test_utils::fixtures::{
    feature_collection, geopackage, kml_document, DbfRow, GpkgLayer, ShapefileBuilder,
};
use cadastre_test_utils::{rect, square_grid, unit_square};

const ETRS89_UTM32N: &str = r#"PROJCS["ETRS89 / UTM zone 32N",GEOGCS["ETRS89",DATUM["European_Terrestrial_Reference_System_1989",SPHEROID["GRS 1980",6378137,298.257222101]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["latitude_of_origin",0],PARAMETER["central_meridian",9],PARAMETER["scale_factor",0.9996],PARAMETER["false_easting",500000],PARAMETER["false_northing",0],UNIT["metre",1],AUTHORITY["EPSG","25832"]]"#;

#[test]
fn geojson_round_trip_keeps_ids_and_order() {
    let grid = square_grid(3, 3);
    let doc = feature_collection(&grid);
    let out = extract(Source::bytes(doc, Some("grid.geojson")), None).unwrap();
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    assert_eq!(out.dataset.len(), 9);
    let ids: Vec<u64> = out.dataset.iter().map(|f| f.id().0).collect();
    assert_eq!(ids, (0..9).collect::<Vec<_>>());
    assert_eq!(out.dataset.crs(), Crs::WORKING);
    let meta = &out.dataset.sources()[0];
    assert_eq!(meta.format, SourceFormat::GeoJson);
    assert_eq!(meta.filename.as_deref(), Some("grid.geojson"));
}

#[test]
fn non_polygon_features_are_skipped_with_warnings() {
    let doc = serde_json::json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": {}},
            {"type": "Feature", "geometry": {"type": "Polygon",
                "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}, "properties": {"lot": 4}},
        ],
    });
    let out = extract(Source::bytes(doc.to_string(), None), None).unwrap();
    assert_eq!(out.dataset.len(), 1);
    assert_eq!(out.warnings.len(), 1);
    assert_eq!(out.warnings[0].scope, WarningScope::Feature("#0".into()));
    assert_eq!(
        out.dataset.features()[0].properties()["lot"],
        PropertyValue::Number(4.0)
    );
}

#[test]
fn unsupported_crs_keeps_coordinates_and_warns() {
    let doc = serde_json::json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "EPSG:2154"}},
        "features": [
            {"type": "Feature", "geometry": {"type": "Polygon",
                "coordinates": [[[700000,6600000],[700010,6600000],[700010,6600010],[700000,6600000]]]},
             "properties": {}},
        ],
    });
    let out = extract(Source::bytes(doc.to_string(), None), None).unwrap();
    assert_eq!(out.dataset.crs(), Crs::Epsg(2154));
    assert_eq!(out.warnings.len(), 1);
    assert_eq!(out.dataset.features()[0].bbox().min_x, 700_000.0);
}

#[test]
fn web_mercator_geojson_is_reprojected() {
    let doc = serde_json::json!({
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
        "features": [
            {"type": "Feature", "geometry": {"type": "Polygon",
                "coordinates": [[[0,0],[111319.49079327357,0],[111319.49079327357,111325.14286638486],[0,0]]]},
             "properties": {}},
        ],
    });
    let out = extract(Source::bytes(doc.to_string(), None), None).unwrap();
    assert!(out.warnings.is_empty());
    assert_eq!(out.dataset.crs(), Crs::WORKING);
    let bbox = out.dataset.features()[0].bbox();
    assert!((bbox.max_x - 1.0).abs() < 1e-9);
    assert!((bbox.max_y - 1.0).abs() < 1e-9);
}

#[test]
fn geopackage_primary_keys_become_ids() {
    let data = geopackage(
        4326,
        &[GpkgLayer::polygons(
            "parcels",
            vec![unit_square(0.0, 0.0), unit_square(1.0, 0.0)],
        )],
    );
    let out = extract(Source::bytes(data, Some("parcels.gpkg")), None).unwrap();
    assert!(out.warnings.is_empty());
    let ids: Vec<FeatureId> = out.dataset.iter().map(|f| f.id()).collect();
    assert_eq!(ids, vec![FeatureId(1), FeatureId(2)]);
    let meta = &out.dataset.sources()[0];
    assert_eq!(meta.layer.as_deref(), Some("parcels"));
    assert_eq!(meta.format, SourceFormat::GeoPackage);
}

#[test]
fn shapefile_in_utm_is_reprojected() {
    let set = ShapefileBuilder::new()
        .record(
            vec![rect(500_000.0, 5_316_300.224_7, 500_100.0, 5_316_400.0)],
            DbfRow::new("Flurstueck 1", 1),
        )
        .prj(ETRS89_UTM32N)
        .build();
    let out = extract(Source::bytes(set.zip("flur"), Some("flur.zip")), None).unwrap();
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    assert_eq!(out.dataset.crs(), Crs::WORKING);
    let bbox = out.dataset.features()[0].bbox();
    assert!((bbox.min_x - 9.0).abs() < 1e-3);
    assert!((bbox.min_y - 48.0).abs() < 1e-3);
    assert_eq!(out.dataset.sources()[0].filename.as_deref(), Some("flur.shp"));
}

#[test]
fn shapefile_path_reads_sidecars() {
    let set = ShapefileBuilder::new()
        .record(vec![unit_square(0.0, 0.0)], DbfRow::new("a", 7))
        .record(vec![unit_square(1.0, 0.0)], DbfRow::new("b", 8))
        .prj(r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984"],AUTHORITY["EPSG","4326"]]"#)
        .build();
    let dir = tempfile::tempdir().unwrap();
    for (name, bytes) in set.entries("lots") {
        std::fs::write(dir.path().join(name), bytes).unwrap();
    }
    let out = extract(Source::path(dir.path().join("lots.shp")), None).unwrap();
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    assert_eq!(out.dataset.len(), 2);
    assert_eq!(
        out.dataset.features()[1].properties()["CODE"],
        PropertyValue::Number(8.0)
    );
}

#[test]
fn bare_shapefile_without_sidecars_warns() {
    let set = ShapefileBuilder::new()
        .record(vec![unit_square(0.0, 0.0)], DbfRow::new("a", 1))
        .build();
    let out = extract(Source::bytes(set.shp, Some("lots.shp")), None).unwrap();
    assert_eq!(out.dataset.len(), 1);
    assert_eq!(out.dataset.crs(), Crs::Unknown);
    // No .dbf and no .prj.
    assert_eq!(out.warnings.len(), 2);
}

#[test]
fn kml_placemark_ids_are_used() {
    let doc = kml_document(&[
        (Some("12"), "Lot 12", unit_square(0.0, 0.0)),
        (Some("13"), "Lot 13", unit_square(1.0, 0.0)),
    ]);
    let out = extract(Source::bytes(doc, Some("lots.kml")), None).unwrap();
    assert!(out.warnings.is_empty());
    let ids: Vec<u64> = out.dataset.iter().map(|f| f.id().0).collect();
    assert_eq!(ids, vec![12, 13]);
    assert_eq!(
        out.dataset.features()[0].properties()["name"],
        PropertyValue::from("Lot 12")
    );
}

#[test]
fn kml_without_ids_is_numbered_from_zero() {
    let doc = kml_document(&[
        (None, "a", unit_square(0.0, 0.0)),
        (None, "b", unit_square(1.0, 0.0)),
    ]);
    let out = extract(Source::bytes(doc, None), Some(FormatHint::Kml)).unwrap();
    let ids: Vec<u64> = out.dataset.iter().map(|f| f.id().0).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn cancelled_ingest_stops() {
    let token = cadastre_core::CancelToken::new();
    token.cancel();
    let doc = feature_collection(&square_grid(2, 2));
    let err = cadastre_ingest::Ingestor::default()
        .extract_with_cancel(Source::bytes(doc, None), None, &token)
        .unwrap_err();
    assert!(matches!(err, IngestError::Cancelled));
}

//! Id assignment over arbitrary feature orders and id layouts.

use cadastre_core::geojson::geometry_to_value;
use cadastre_core::FeatureId;
use cadastre_ingest::{extract, FormatHint, Source};
use cadastre_test_utils::fixtures::feature_collection;
use cadastre_test_utils::{shuffled, square_grid, unit_square};
use geo_types::Geometry;
use proptest::prelude::*;
use std::collections::HashSet;

fn square_feature(id: Option<u64>, x: f64) -> serde_json::Value {
    let poly = unit_square(x, 0.0);
    let mut f = serde_json::json!({
        "type": "Feature",
        "properties": {},
        "geometry": geometry_to_value(&Geometry::Polygon(poly)),
    });
    if let Some(id) = id {
        f["id"] = id.into();
    }
    f
}

proptest! {
    #[test]
    fn source_ids_survive_any_order(rows in 1usize..6, cols in 1usize..6, seed in any::<u64>()) {
        let grid = square_grid(rows, cols);
        let mixed = shuffled(&grid, seed);
        let doc = feature_collection(&mixed);
        let out = extract(Source::bytes(doc, None), Some(FormatHint::GeoJson)).unwrap();
        prop_assert!(out.warnings.is_empty());
        prop_assert_eq!(out.dataset.len(), grid.len());
        for (got, want) in out.dataset.iter().zip(mixed.iter()) {
            prop_assert_eq!(got.id(), want.id());
            prop_assert_eq!(got.bbox(), want.bbox());
        }
    }

    #[test]
    fn unusable_ids_fall_back_to_sequence(ids in proptest::collection::vec(proptest::option::of(0u64..4), 1..12)) {
        let features: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| square_feature(*id, i as f64 * 2.0))
            .collect();
        let doc = serde_json::json!({"type": "FeatureCollection", "features": features}).to_string();
        let out = extract(Source::bytes(doc, None), None).unwrap();
        prop_assert_eq!(out.dataset.len(), ids.len());

        let unique: HashSet<u64> = ids.iter().flatten().copied().collect();
        let usable = ids.iter().all(Option::is_some) && unique.len() == ids.len();
        let got: Vec<FeatureId> = out.dataset.iter().map(|f| f.id()).collect();
        if usable {
            let want: Vec<FeatureId> = ids.iter().flatten().copied().map(FeatureId).collect();
            prop_assert_eq!(got, want);
            prop_assert!(out.warnings.is_empty());
        } else {
            let want: Vec<FeatureId> = (0..ids.len() as u64).map(FeatureId).collect();
            prop_assert_eq!(got, want);
            let expected = usize::from(ids.iter().any(Option::is_some));
            prop_assert_eq!(out.warnings.len(), expected);
        }
    }
}

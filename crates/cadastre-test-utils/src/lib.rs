//! Test utilities and fixtures for Cadastre development.
//!
//! Provides synthetic tessellations ([`square_grid`], [`brick_tessellation`])
//! for adjacency and index tests, and byte-level builders for every
//! supported source format in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use cadastre_core::{Crs, Dataset, Feature, FeatureId, Properties, PropertyValue};
use geo_types::{LineString, Polygon};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Axis-aligned rectangle polygon, exterior counter-clockwise.
pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ]),
        vec![],
    )
}

/// Unit square with its lower-left corner at `(x, y)`.
pub fn unit_square(x: f64, y: f64) -> Polygon<f64> {
    rect(x, y, x + 1.0, y + 1.0)
}

/// Properties `{"row": r, "col": c}`.
fn grid_properties(row: usize, col: usize) -> Properties {
    let mut props = Properties::new();
    props.insert("row".into(), PropertyValue::Number(row as f64));
    props.insert("col".into(), PropertyValue::Number(col as f64));
    props
}

/// `rows × cols` grid of unit squares sharing edges.
///
/// Cell `(row, col)` spans `[col, col+1] × [row, row+1]` and has id
/// `row * cols + col`.
pub fn square_grid(rows: usize, cols: usize) -> Dataset {
    let mut features = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let id = FeatureId((row * cols + col) as u64);
            let feature = Feature::new(
                id,
                unit_square(col as f64, row as f64),
                grid_properties(row, col),
            )
            .expect("unit squares are valid");
            features.push(feature);
        }
    }
    Dataset::new(features, Crs::WORKING, None).expect("grid ids are unique")
}

/// Id of cell `(row, col)` in a [`square_grid`] with `cols` columns.
pub fn grid_id(cols: usize, row: usize, col: usize) -> FeatureId {
    FeatureId((row * cols + col) as u64)
}

/// Rows of rectangles with independently placed vertical cuts.
///
/// Every row spans `[0, cols] × [row, row+1]` and is split into `cols`
/// rectangles at cut positions drawn from multiples of 0.5, so adjacent
/// rows meet in T-junctions and partial shared edges. Coordinates stay
/// exactly representable, which keeps exact predicates deterministic.
/// Ids run row-major from 0.
pub fn brick_tessellation(rows: usize, cols: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(rows * cols);
    let mut next_id = 0u64;
    for row in 0..rows {
        let mut slots: Vec<usize> = (1..2 * cols).collect();
        slots.shuffle(&mut rng);
        let mut cuts: Vec<f64> = slots[..cols.saturating_sub(1)]
            .iter()
            .map(|&k| k as f64 * 0.5)
            .collect();
        cuts.sort_by(f64::total_cmp);

        let mut edges = Vec::with_capacity(cols + 1);
        edges.push(0.0);
        edges.extend(cuts);
        edges.push(cols as f64);

        for (col, pair) in edges.windows(2).enumerate() {
            let poly = rect(pair[0], row as f64, pair[1], row as f64 + 1.0);
            let feature = Feature::new(FeatureId(next_id), poly, grid_properties(row, col))
                .expect("brick cells are valid");
            features.push(feature);
            next_id += 1;
        }
    }
    Dataset::new(features, Crs::WORKING, None).expect("brick ids are unique")
}

/// Same features as `dataset`, in a seeded random order.
pub fn shuffled(dataset: &Dataset, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = dataset.features().to_vec();
    features.shuffle(&mut rng);
    Dataset::new(features, dataset.crs(), dataset.sources().first().cloned())
        .expect("shuffling keeps ids unique")
}

/// Dataset built from explicit `(id, polygon)` pairs.
pub fn dataset_of(polygons: Vec<(u64, Polygon<f64>)>) -> Dataset {
    let features = polygons
        .into_iter()
        .map(|(id, poly)| {
            Feature::new(FeatureId(id), poly, Properties::new()).expect("fixture polygon is valid")
        })
        .collect();
    Dataset::new(features, Crs::WORKING, None).expect("fixture ids are unique")
}

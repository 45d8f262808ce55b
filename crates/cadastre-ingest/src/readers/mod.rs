//! One reader per supported format. Each turns bytes into a
//! [`RawLayer`](crate::raw::RawLayer) without validating geometry.

pub(crate) mod geojson;
pub(crate) mod gpkg;
pub(crate) mod kml;
pub(crate) mod shapefile;
pub(crate) mod wkb;

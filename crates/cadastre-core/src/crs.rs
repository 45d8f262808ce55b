//! Coordinate reference system tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The coordinate reference system a dataset's coordinates are in.
///
/// Ingest normalizes every supported source CRS to [`Crs::WORKING`].
/// Coordinates from an unsupported or undetermined CRS are passed through
/// unchanged and tagged accordingly, so the tag always describes the
/// coordinates actually stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// An EPSG-registered system.
    Epsg(u32),
    /// Source did not declare a system, or declared one we could not read.
    Unknown,
}

impl Crs {
    /// The single working CRS: WGS84 geographic, longitude/latitude order.
    pub const WORKING: Crs = Crs::Epsg(4326);

    /// Whether this is the working CRS.
    pub fn is_working(&self) -> bool {
        *self == Self::WORKING
    }

    /// The EPSG code, if known.
    pub fn epsg(&self) -> Option<u32> {
        match self {
            Self::Epsg(code) => Some(*code),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Unknown => write!(f, "unknown CRS"),
        }
    }
}

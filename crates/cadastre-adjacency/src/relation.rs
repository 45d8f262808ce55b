//! Named topological relations and contiguity rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A DE-9IM relation between two polygons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Boundaries meet, interiors are disjoint.
    Touches,
    /// The geometries share at least one point.
    Intersects,
    /// Interiors meet and neither geometry covers the other.
    Overlaps,
}

impl Relation {
    /// Every relation, in declaration order.
    pub const ALL: [Relation; 3] = [Self::Touches, Self::Intersects, Self::Overlaps];

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Touches => "touches",
            Self::Intersects => "intersects",
            Self::Overlaps => "overlaps",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relation name that is not one of [`Relation::ALL`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown relation {input:?}; expected one of touches, intersects, overlaps")]
pub struct ParseRelationError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Relation {
    type Err = ParseRelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Relation::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseRelationError {
                input: s.to_owned(),
            })
    }
}

/// Which boundary contacts count as adjacency.
///
/// Parcel maps conventionally call two lots neighbours only when they
/// share a stretch of boundary. [`Rook`](Self::Rook) encodes that;
/// [`Queen`](Self::Queen) is the plain DE-9IM reading where a single
/// shared corner is enough.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contiguity {
    /// Boundary-only contact must include a shared segment.
    #[default]
    Rook,
    /// Any shared boundary point counts.
    Queen,
}

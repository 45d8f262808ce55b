//! The [`RelationPredicate`] seam and its `geo`-backed implementation.

use crate::relation::{Contiguity, Relation};
use cadastre_core::Feature;
use geo::coordinate_position::CoordPos;
use geo::dimensions::Dimensions;
use geo::relate::IntersectionMatrix;
use geo::{Area, Relate};
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Why a predicate could not decide a pair.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// One of the inputs cannot be related meaningfully.
    #[error("degenerate geometry: {reason}")]
    Degenerate {
        /// What is wrong with the input.
        reason: String,
    },
    /// The geometry engine panicked on this pair.
    #[error("geometry engine failed: {message}")]
    Engine {
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// Decides one [`Relation`] for one ordered pair of features.
///
/// # Contract
///
/// - `evaluate` MUST be deterministic and free of side effects.
/// - For every relation and pair, `evaluate(r, a, b) == evaluate(r, b, a)`.
/// - Inputs it cannot judge are reported as `Err`, never as `Ok(false)`.
///
/// The engine is generic over this trait so tests and alternative
/// geometry backends can stand in for [`GeoPredicate`].
pub trait RelationPredicate: Send + Sync {
    /// Whether `relation` holds between `a` and `b`.
    fn evaluate(&self, relation: Relation, a: &Feature, b: &Feature)
        -> Result<bool, PredicateError>;
}

/// DE-9IM predicate computed by [`geo::Relate`].
#[derive(Clone, Copy, Debug, Default)]
pub struct GeoPredicate {
    contiguity: Contiguity,
}

impl GeoPredicate {
    /// Predicate applying `contiguity` to boundary contacts.
    pub fn new(contiguity: Contiguity) -> Self {
        Self { contiguity }
    }

    /// The configured contiguity rule.
    pub fn contiguity(&self) -> Contiguity {
        self.contiguity
    }

    fn matrix(a: &Feature, b: &Feature) -> Result<IntersectionMatrix, PredicateError> {
        check_usable(a)?;
        check_usable(b)?;
        panic::catch_unwind(AssertUnwindSafe(|| a.geometry().relate(b.geometry()))).map_err(
            |payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_owned());
                PredicateError::Engine { message }
            },
        )
    }

    fn boundary_contact(&self, m: &IntersectionMatrix) -> bool {
        let bb = m.get(CoordPos::OnBoundary, CoordPos::OnBoundary);
        match self.contiguity {
            Contiguity::Rook => bb == Dimensions::OneDimensional,
            Contiguity::Queen => {
                bb != Dimensions::Empty
                    || m.get(CoordPos::Inside, CoordPos::OnBoundary) != Dimensions::Empty
                    || m.get(CoordPos::OnBoundary, CoordPos::Inside) != Dimensions::Empty
            }
        }
    }
}

fn check_usable(feature: &Feature) -> Result<(), PredicateError> {
    if !feature.bbox().is_finite() {
        return Err(PredicateError::Degenerate {
            reason: format!("feature {} has a non-finite envelope", feature.id()),
        });
    }
    let area = feature.geometry().unsigned_area();
    if area.is_nan() || area <= 0.0 {
        return Err(PredicateError::Degenerate {
            reason: format!("feature {} encloses no area", feature.id()),
        });
    }
    Ok(())
}

impl RelationPredicate for GeoPredicate {
    fn evaluate(
        &self,
        relation: Relation,
        a: &Feature,
        b: &Feature,
    ) -> Result<bool, PredicateError> {
        // Envelopes that do not meet cannot share a point.
        if !a.bbox().intersects(&b.bbox()) {
            return Ok(false);
        }
        let m = Self::matrix(a, b)?;
        let interiors = m.get(CoordPos::Inside, CoordPos::Inside);
        Ok(match relation {
            Relation::Touches => interiors == Dimensions::Empty && self.boundary_contact(&m),
            Relation::Intersects => interiors != Dimensions::Empty || self.boundary_contact(&m),
            Relation::Overlaps => {
                interiors == Dimensions::TwoDimensional
                    && m.get(CoordPos::Inside, CoordPos::Outside) == Dimensions::TwoDimensional
                    && m.get(CoordPos::Outside, CoordPos::Inside) == Dimensions::TwoDimensional
            }
        })
    }
}

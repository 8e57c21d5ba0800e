//! Typed rejections returned across the public editing boundary.

use std::fmt;

use thiserror::Error;

use crate::{bodies::BodyId, host::VesselId};

/// Which limit a destination position violated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bound {
    AboveSphereOfInfluence,
    BelowSurface,
    NonFinite,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::AboveSphereOfInfluence => write!(f, "above the sphere of influence"),
            Bound::BelowSurface => write!(f, "below the surface"),
            Bound::NonFinite => write!(f, "not a finite position"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum EditError {
    #[error("destination position was {bound} (distance {distance}, limit {limit})")]
    OutOfBoundsTarget {
        distance: f64,
        limit: f64,
        bound: Bound,
    },
    #[error("body {0:?} has no solid terrain")]
    MissingTerrainModel(BodyId),
    #[error("no such vessel: {0:?}")]
    UnknownVessel(VesselId),
    #[error("no such body: {0:?}")]
    UnknownBody(BodyId),
    #[error("{0} has no orbit to edit")]
    NoOrbit(String),
    #[error("{body} cannot orbit {reference}")]
    InvalidReference { body: String, reference: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type EditResult<T = ()> = Result<T, EditError>;

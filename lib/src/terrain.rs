//! Terrain heights: an analytic model and a ray-measured correction.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    bodies::{Body, BodyId},
    error::{EditError, EditResult},
    host::Host,
};

/// Height above the ideal surface from which the correction ray starts.
pub const RAY_START_HEIGHT: f64 = 1000.0;
/// Height above the ideal surface the correction ray is aimed at.
pub const RAY_AIM_HEIGHT: f64 = 800.0;
/// Hits further than this from the ray start are ignored.
pub const MAX_RAY_DISTANCE: f64 = 3000.0;

/// One spherical-harmonic-like term of a [`TerrainModel`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainTerm {
    pub amplitude: f64,
    pub lat_frequency: f64,
    pub lon_frequency: f64,
    /// Phase offset (`rad`).
    pub phase: f64,
}

/// Smooth analytic elevation of a solid body, relative to its reference
/// radius. Negative heights are below sea level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainModel {
    pub offset: f64,
    pub terms: Vec<TerrainTerm>,
    /// Does the body have liquid oceans covering negative heights?
    pub ocean: bool,
}

impl TerrainModel {
    /// A perfectly smooth surface at `offset` metres.
    pub fn flat(offset: f64) -> Self {
        Self {
            offset,
            terms: vec![],
            ocean: false,
        }
    }

    /// Height at a geographic coordinate (degrees).
    pub fn height(&self, lat: f64, lon: f64) -> f64 {
        let (lat, lon) = (lat.to_radians(), lon.to_radians());
        self.offset
            + self
                .terms
                .iter()
                .map(|t| {
                    t.amplitude
                        * libm::cos(t.lat_frequency * lat)
                        * libm::sin(t.lon_frequency * lon + t.phase)
                })
                .sum::<f64>()
    }
}

/// Smooth-surface height of `body` at (`lat`, `lon`). Deterministic and
/// free of side effects.
pub fn ideal_height(body: &Body, id: BodyId, lat: f64, lon: f64) -> EditResult<f64> {
    body.terrain
        .as_ref()
        .map(|t| t.height(lat, lon))
        .ok_or(EditError::MissingTerrainModel(id))
}

/// Height of the collidable terrain at (`lat`, `lon`).
///
/// A ray is cast straight down from [`RAY_START_HEIGHT`] above the ideal
/// surface. A hit within [`MAX_RAY_DISTANCE`] replaces the ideal height,
/// anything else falls back to it.
pub fn actual_height(host: &impl Host, id: BodyId, lat: f64, lon: f64) -> EditResult<f64> {
    let body = host.body(id).ok_or(EditError::UnknownBody(id))?;
    let ideal = ideal_height(body, id, lat, lon)?;

    let origin = body.fixed_surface_position(lat, lon, ideal + RAY_START_HEIGHT);
    let aim = body.fixed_surface_position(lat, lon, ideal + RAY_AIM_HEIGHT);
    let direction: Vector3<f64> = (aim - origin).normalize();

    match host.raycast_terrain(id, origin, direction) {
        Some(distance) if distance.abs() < MAX_RAY_DISTANCE => {
            let measured = ideal + RAY_START_HEIGHT - distance;
            trace!(lat, lon, ideal, measured, "terrain ray hit");
            Ok(measured)
        }
        _ => Ok(ideal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Simulation;

    #[test]
    fn model_height() {
        let model = TerrainModel {
            offset: 100.0,
            terms: vec![TerrainTerm {
                amplitude: 50.0,
                lat_frequency: 0.0,
                lon_frequency: 1.0,
                phase: 0.0,
            }],
            ocean: false,
        };
        assert!((model.height(0.0, 90.0) - 150.0).abs() < 1e-9);
        assert!((model.height(0.0, 0.0) - 100.0).abs() < 1e-9);
        assert!((TerrainModel::flat(7.0).height(12.0, 34.0) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn heights_are_pure() {
        let sim = Simulation::kerbol();
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        let body = sim.body(kerbin).unwrap();
        let a = ideal_height(body, kerbin, -0.0972, 285.4423).unwrap();
        let b = ideal_height(body, kerbin, -0.0972, 285.4423).unwrap();
        assert_eq!(a, b);
        let a = actual_height(&sim, kerbin, 10.0, 20.0).unwrap();
        let b = actual_height(&sim, kerbin, 10.0, 20.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn actual_height_falls_back_without_mesh() {
        let mut sim = Simulation::kerbol();
        sim.load_radius = 0.0;
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        let ideal = ideal_height(sim.body(kerbin).unwrap(), kerbin, 33.0, 44.0).unwrap();
        assert_eq!(actual_height(&sim, kerbin, 33.0, 44.0).unwrap(), ideal);
    }

    #[test]
    fn actual_height_uses_mesh_hit() {
        let mut sim = Simulation::kerbol();
        sim.load_radius = f64::INFINITY;
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        let ideal = ideal_height(sim.body(kerbin).unwrap(), kerbin, 33.3, 44.4).unwrap();
        let actual = actual_height(&sim, kerbin, 33.3, 44.4).unwrap();
        assert!((actual - sim.mesh_height(kerbin, 33.3, 44.4).unwrap()).abs() < 1e-6);
        // the mesh is a faceted approximation of the same surface
        assert!((actual - ideal).abs() < 50.0);
    }

    #[test]
    fn star_has_no_terrain() {
        let sim = Simulation::kerbol();
        let kerbol = sim.body_by_name("Kerbol").unwrap();
        assert_eq!(
            actual_height(&sim, kerbol, 0.0, 0.0),
            Err(EditError::MissingTerrainModel(kerbol))
        );
    }
}

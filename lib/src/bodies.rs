//! Definitions of celestial bodies.

use std::f64::consts;

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{id_type, kepler::orbits::Orbit, terrain::TerrainModel, time::UT};

id_type!(
    /// Identity of a celestial body. Orbits refer to their reference
    /// body by id and never own it.
    BodyId
);

/// Upper bound for the sphere of influence used when scaling editor
/// sliders. Larger than the apoapsis of any stock planet.
pub const MAX_SAFE_SOI: f64 = 200_000_000_000.0;

/// A celestial body.
///
/// Positions relative to a body use a body-centred inertial frame whose
/// `z` axis is the spin axis. The body-fixed frame co-rotates with the
/// surface and has latitude 0, longitude 0 on its `x` axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Standard gravitational parameter (`m^3/s^2`)
    pub mu: f64,
    /// Mean radius of the body's sphere (`m`)
    pub radius: f64,
    /// Height of the top of the atmosphere above `radius` (`m`), zero
    /// without an atmosphere.
    pub atmosphere_depth: f64,
    /// Orbit around the parent body, `None` for the root star
    pub ephem: Option<Orbit>,
    /// Rotational period, length of sidereal day (`sec`)
    pub rotperiod: f64,
    /// Initial rotation about the body spin axis at UT 0 (`rad`)
    pub rotini: f64,
    /// Bodies orbiting this body.
    pub satellites: Vec<BodyId>,
    /// The parent body of this body, if any.
    pub parent: Option<BodyId>,
    /// Name of this body as displayed in game
    pub name: String,
    /// Is this a star?
    pub is_star: bool,
    /// Radius of this body's sphere of influence (`m`), infinite for the
    /// root star.
    pub soi: f64,
    /// Radius of this body's Hill sphere (`m`)
    pub hill_sphere: f64,
    /// Analytic terrain. Bodies without a solid surface have none.
    pub terrain: Option<TerrainModel>,
}

impl Body {
    /// Sphere of influence shrunk by 5%, with non-finite or absurd
    /// values replaced by [`MAX_SAFE_SOI`].
    pub fn safe_soi(&self) -> f64 {
        let radius = self.soi * 0.95;
        if !radius.is_finite() || radius < 0.0 || radius > MAX_SAFE_SOI {
            MAX_SAFE_SOI
        } else {
            radius
        }
    }

    pub fn angular_velocity(&self) -> Vector3<f64> {
        if self.rotperiod.is_finite() && self.rotperiod.abs() > f64::EPSILON {
            Vector3::new(0.0, 0.0, 2.0 * consts::PI / self.rotperiod)
        } else {
            Vector3::zeros()
        }
    }

    /// Rotation of the body-fixed frame relative to the inertial frame
    /// at `ut` (`rad`).
    pub fn rotation_angle(&self, ut: UT) -> f64 {
        self.rotini + self.angular_velocity()[2] * ut.as_seconds()
    }

    fn spin(&self, ut: UT) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::z_axis(), self.rotation_angle(ut))
    }

    pub fn fixed_to_inertial(&self, ut: UT, v: Vector3<f64>) -> Vector3<f64> {
        self.spin(ut) * v
    }

    pub fn inertial_to_fixed(&self, ut: UT, v: Vector3<f64>) -> Vector3<f64> {
        self.spin(ut).inverse() * v
    }

    /// Outward unit normal of the reference sphere at a geographic
    /// coordinate, in the body-fixed frame. Angles in degrees.
    pub fn surface_normal(lat: f64, lon: f64) -> Vector3<f64> {
        let (lat, lon) = (lat.to_radians(), lon.to_radians());
        Vector3::new(
            libm::cos(lat) * libm::cos(lon),
            libm::cos(lat) * libm::sin(lon),
            libm::sin(lat),
        )
    }

    /// Body-fixed position `alt` metres above the reference sphere.
    pub fn fixed_surface_position(&self, lat: f64, lon: f64, alt: f64) -> Vector3<f64> {
        (self.radius + alt) * Self::surface_normal(lat, lon)
    }

    /// Inertial, body-relative position `alt` metres above the
    /// reference sphere at `ut`.
    pub fn surface_position(&self, ut: UT, lat: f64, lon: f64, alt: f64) -> Vector3<f64> {
        self.fixed_to_inertial(ut, self.fixed_surface_position(lat, lon, alt))
    }

    /// Latitude and longitude (degrees, longitude in `[-180, 180)`) below
    /// an inertial, body-relative position.
    pub fn lat_lon(&self, ut: UT, position: Vector3<f64>) -> (f64, f64) {
        let fixed = self.inertial_to_fixed(ut, position);
        let r = fixed.norm();
        if r == 0.0 {
            return (0.0, 0.0);
        }
        let lat = libm::asin((fixed[2] / r).clamp(-1.0, 1.0)).to_degrees();
        let lon = libm::atan2(fixed[1], fixed[0]).to_degrees();
        (lat, crate::geodesy::normalize_angle(lon, -180.0))
    }

    /// Height above the reference sphere.
    pub fn altitude(&self, position: Vector3<f64>) -> f64 {
        position.norm() - self.radius
    }

    /// Velocity of the surface (co-rotating frame) at a body-relative
    /// inertial position.
    pub fn surface_velocity(&self, position: Vector3<f64>) -> Vector3<f64> {
        self.angular_velocity().cross(&position)
    }

    /// Recompute the Hill sphere and sphere of influence from the
    /// body's current orbit around a parent with parameter `parent_mu`.
    pub fn refresh_spheres(&mut self, parent_mu: f64) {
        let Some(ephem) = &self.ephem else {
            return;
        };
        let ratio = self.mu / parent_mu;
        self.hill_sphere =
            ephem.semi_major_axis * (1.0 - ephem.eccentricity) * libm::pow(ratio, 1.0 / 3.0);
        self.soi = ephem.semi_major_axis * libm::pow(ratio, 2.0 / 5.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spinning() -> Body {
        Body {
            mu: 3.5316e12,
            radius: 600_000.0,
            atmosphere_depth: 70_000.0,
            ephem: None,
            rotperiod: 21_549.425,
            rotini: 0.3,
            satellites: vec![],
            parent: None,
            name: "Kerbin".into(),
            is_star: false,
            soi: 84_159_286.0,
            hill_sphere: 0.0,
            terrain: None,
        }
    }

    #[test]
    fn lat_lon_inverts_surface_position() {
        let body = spinning();
        let ut = UT::new_seconds(1234.0);
        let pos = body.surface_position(ut, -12.5, 130.25, 500.0);
        let (lat, lon) = body.lat_lon(ut, pos);
        assert!((lat + 12.5).abs() < 1e-9);
        assert!((lon - 130.25).abs() < 1e-9);
        assert!((body.altitude(pos) - 500.0).abs() < 1e-6);
    }

    #[test]
    fn safe_soi_clamps() {
        let mut body = spinning();
        assert!((body.safe_soi() - 84_159_286.0 * 0.95).abs() < 1e-3);
        body.soi = f64::INFINITY;
        assert_eq!(body.safe_soi(), MAX_SAFE_SOI);
        body.soi = -1.0;
        assert_eq!(body.safe_soi(), MAX_SAFE_SOI);
    }

    #[test]
    fn surface_velocity_is_eastward() {
        let body = spinning();
        let pos = Vector3::new(600_000.0, 0.0, 0.0);
        let v = body.surface_velocity(pos);
        assert!(v[1] > 0.0);
        assert!((v.norm() - 600_000.0 * 2.0 * consts::PI / body.rotperiod).abs() < 1e-9);
    }
}

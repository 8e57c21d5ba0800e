//! Keplerian orbits.

use std::f64::consts;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{bodies::BodyId, time::UT};

const TAU: f64 = 2.0 * consts::PI;

/// Tolerance and iteration cap for the Kepler equation solvers.
pub const KEPLER_TOL: f64 = 1e-12;
pub const KEPLER_MAXITER: u64 = 64;

/// A Keplerian orbit described by the six classical elements plus the
/// epoch at which the mean anomaly applies.
///
/// Angles follow the in-game convention: inclination, longitude of the
/// ascending node and argument of periapsis are in degrees, the mean
/// anomaly at epoch is in radians.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orbit {
    /// Inclination (degrees).
    pub inclination: f64,
    /// Eccentricity (dimensionless).
    pub eccentricity: f64,
    /// Semi-major axis (m), negative for hyperbolic orbits.
    pub semi_major_axis: f64,
    /// Longitude of ascending node (degrees).
    pub lan: f64,
    /// Argument of periapsis (degrees).
    pub argument_of_periapsis: f64,
    /// Mean anomaly at `epoch` (radians).
    pub mean_anomaly_at_epoch: f64,
    /// The epoch at which `mean_anomaly_at_epoch` applies.
    pub epoch: UT,
    /// Body this orbit is centred on.
    pub body: BodyId,
}

impl Orbit {
    pub fn is_hyperbolic(&self) -> bool {
        self.eccentricity > 1.0
    }

    pub fn periapsis_radius(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    /// Infinite for open orbits.
    pub fn apoapsis_radius(&self) -> f64 {
        if self.eccentricity >= 1.0 {
            f64::INFINITY
        } else {
            self.semi_major_axis * (1.0 + self.eccentricity)
        }
    }

    pub fn semi_latus_rectum(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity.powi(2))
    }

    pub fn mean_motion(&self, mu: f64) -> f64 {
        libm::sqrt(mu / self.semi_major_axis.abs().powi(3))
    }

    pub fn mean_anomaly_at(&self, ut: UT, mu: f64) -> f64 {
        self.mean_anomaly_at_epoch + self.mean_motion(mu) * ut.seconds_since(self.epoch)
    }

    pub fn true_anomaly_at(&self, ut: UT, mu: f64) -> f64 {
        ma_to_ta(
            self.mean_anomaly_at(ut, mu),
            self.eccentricity,
            KEPLER_TOL,
            KEPLER_MAXITER,
        )
    }

    /// Calculate the position and velocity in the perifocal
    /// coordinate system PQW at the given true anomaly.
    fn sv_pqw(&self, mu: f64, ta: f64) -> (Vector3<f64>, Vector3<f64>) {
        let p = self.semi_latus_rectum();
        let e = self.eccentricity;
        let r = p / (1.0 + e * libm::cos(ta));
        let rv = r * libm::cos(ta) * Vector3::new(1.0, 0.0, 0.0)
            + r * libm::sin(ta) * Vector3::new(0.0, 1.0, 0.0);
        let vv = libm::sqrt(mu / p)
            * (-libm::sin(ta) * Vector3::new(1.0, 0.0, 0.0)
                + (e + libm::cos(ta)) * Vector3::new(0.0, 1.0, 0.0));
        (rv, vv)
    }

    fn pqw_ijk_matrix(&self) -> Matrix3<f64> {
        let lan = self.lan.to_radians();
        let argpe = self.argument_of_periapsis.to_radians();
        let i = self.inclination.to_radians();

        let m11 = libm::cos(lan) * libm::cos(argpe) - libm::sin(lan) * libm::sin(argpe) * libm::cos(i);
        let m12 =
            -libm::cos(lan) * libm::sin(argpe) - libm::sin(lan) * libm::cos(argpe) * libm::cos(i);
        let m13 = libm::sin(lan) * libm::sin(i);
        let m21 = libm::sin(lan) * libm::cos(argpe) + libm::cos(lan) * libm::sin(argpe) * libm::cos(i);
        let m22 =
            -libm::sin(lan) * libm::sin(argpe) + libm::cos(lan) * libm::cos(argpe) * libm::cos(i);
        let m23 = -libm::cos(lan) * libm::sin(i);
        let m31 = libm::sin(argpe) * libm::sin(i);
        let m32 = libm::cos(argpe) * libm::sin(i);
        let m33 = libm::cos(i);

        Matrix3::new(m11, m12, m13, m21, m22, m23, m31, m32, m33)
    }

    /// Unit normal of the orbital plane (direction of the angular
    /// momentum).
    pub fn normal(&self) -> Vector3<f64> {
        self.pqw_ijk_matrix().column(2).into_owned()
    }

    /// Position and velocity relative to the reference body at `ut`.
    pub fn state_at(&self, ut: UT, mu: f64) -> StateVector {
        let ta = self.true_anomaly_at(ut, mu);
        let (rv, vv) = self.sv_pqw(mu, ta);
        let mat = self.pqw_ijk_matrix();
        StateVector {
            body: self.body,
            position: mat * rv,
            velocity: mat * vv,
            time: ut,
        }
    }

    pub fn position_at(&self, ut: UT, mu: f64) -> Vector3<f64> {
        self.state_at(ut, mu).position
    }

    pub fn velocity_at(&self, ut: UT, mu: f64) -> Vector3<f64> {
        self.state_at(ut, mu).velocity
    }
}

/// Position and velocity of an object relative to a body, in that
/// body's inertial frame.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub body: BodyId,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub time: UT,
}

impl StateVector {
    /// Convert this state vector into an [`Orbit`] whose epoch is the
    /// state vector's time.
    ///
    /// Equatorial orbits get a longitude of ascending node of zero and
    /// circular orbits an argument of periapsis of zero, so the returned
    /// orbit always reproduces `position` at `time`.
    ///
    /// Recommended tolerance (`tol`): `1e-11`.
    pub fn into_orbit(self, mu: f64, tol: f64) -> Orbit {
        let rv = self.position;
        let r = rv.norm();
        let vv = self.velocity;
        let v = vv.norm();
        let hv = rv.cross(&vv);
        let h = hv.norm();
        let nv = Vector3::new(0.0, 0.0, 1.0).cross(&hv);
        let ev = 1.0 / mu * ((v.powi(2) - mu / r) * rv - rv.dot(&vv) * vv);
        let e = ev.norm();
        let energy = v.powi(2) / 2.0 - mu / r;
        let a = -mu / (2.0 * energy);
        let i = libm::acos((hv[2] / h).clamp(-1.0, 1.0));

        let equatorial = nv.norm() <= tol * h;
        let circular = e < tol;

        let hhat = hv / h;
        let node = if equatorial {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            nv.normalize()
        };
        let pe = if circular { node } else { ev / e };

        let lan = libm::atan2(node[1], node[0]);
        let argpe = libm::atan2(pe.dot(&hhat.cross(&node)), pe.dot(&node));
        let ta = libm::atan2(rv.dot(&hhat.cross(&pe)), rv.dot(&pe));

        let mut ma = ta_to_ma(ta, e);
        if e < 1.0 {
            ma = ma.rem_euclid(TAU);
        }

        Orbit {
            inclination: i.to_degrees(),
            eccentricity: e,
            semi_major_axis: a,
            lan: lan.to_degrees().rem_euclid(360.0),
            argument_of_periapsis: argpe.to_degrees().rem_euclid(360.0),
            mean_anomaly_at_epoch: ma,
            epoch: self.time,
            body: self.body,
        }
    }
}

fn f_to_ta(f: f64, ecc: f64) -> f64 {
    2.0 * libm::atan(libm::sqrt((ecc + 1.0) / (ecc - 1.0)) * libm::tanh(f / 2.0))
}

/// Mean anomaly to true anomaly, for closed and open orbits.
pub fn ma_to_ta(ma: f64, e: f64, tol: f64, maxiter: u64) -> f64 {
    if e < 1.0 {
        let ea = ma_to_ea(ma, e, tol, maxiter);
        ea_to_ta(ea, e)
    } else {
        let ha = ma_to_ha(ma, e, tol, maxiter);
        f_to_ta(ha, e)
    }
}

/// True anomaly to mean anomaly, for closed and open orbits.
pub fn ta_to_ma(ta: f64, e: f64) -> f64 {
    if e < 1.0 {
        let ea = libm::atan2(libm::sqrt(1.0 - e.powi(2)) * libm::sin(ta), e + libm::cos(ta));
        ea - e * libm::sin(ea)
    } else {
        let ha = 2.0 * libm::atanh(libm::sqrt((e - 1.0) / (e + 1.0)) * libm::tan(ta / 2.0));
        e * libm::sinh(ha) - ha
    }
}

pub fn ea_to_ta(ea: f64, e: f64) -> f64 {
    let beta = e / (1.0 + libm::sqrt(1.0 - e.powi(2)));
    ea + 2.0 * libm::atan2(beta * libm::sin(ea), 1.0 - beta * libm::cos(ea))
}

/// Solve Kepler's equation `M = E - e sin E` for the eccentric anomaly.
/// Returns the last iterate if the iteration does not converge.
pub fn ma_to_ea(ma: f64, e: f64, tol: f64, maxiter: u64) -> f64 {
    let ma = ma.rem_euclid(TAU);
    let mut ea_new = if ma > consts::PI { ma - e } else { ma + e };

    let mut ea;
    let mut iter = 0;
    while iter < maxiter {
        ea = ea_new;
        ea_new = ea + (ma - ea + e * libm::sin(ea)) / (1.0 - e * libm::cos(ea));

        if (ea_new - ea).abs() < tol {
            return ea_new;
        }

        iter += 1;
    }
    trace!("ma_to_ea({ma}, {e}, {tol}, {maxiter}): failed to converge");
    ea_new
}

/// Solve the hyperbolic Kepler equation `M = e sinh H - H` for the
/// hyperbolic anomaly. Returns the last iterate if the iteration does
/// not converge.
pub fn ma_to_ha(ma: f64, e: f64, tol: f64, maxiter: u64) -> f64 {
    let mut ha_new = ma.signum() * libm::log(2.0 * ma.abs() / e + 1.8);

    let mut ha;
    let mut iter = 0;
    while iter < maxiter {
        ha = ha_new;
        ha_new = ha - (e * libm::sinh(ha) - ha - ma) / (e * libm::cosh(ha) - 1.0);

        if (ha_new - ha).abs() < tol * (1.0 + ha.abs()) {
            return ha_new;
        }

        iter += 1;
    }
    trace!("ma_to_ha({ma}, {e}, {tol}, {maxiter}): failed to converge");
    ha_new
}

#[cfg(test)]
mod tests {
    use super::*;

    const MU: f64 = 3.5316e12;

    fn orbit(i: f64, e: f64, a: f64, lan: f64, w: f64, m: f64) -> Orbit {
        Orbit {
            inclination: i,
            eccentricity: e,
            semi_major_axis: a,
            lan,
            argument_of_periapsis: w,
            mean_anomaly_at_epoch: m,
            epoch: UT::new_seconds(100.0),
            body: BodyId::default(),
        }
    }

    fn assert_close(a: Vector3<f64>, b: Vector3<f64>, tol: f64) {
        assert!((a - b).norm() <= tol * b.norm().max(1.0), "{a} != {b}");
    }

    #[test]
    fn state_vector_round_trip_elliptic() {
        let obt = orbit(28.5, 0.2, 900_000.0, 40.0, 70.0, 1.1);
        let ut = UT::new_seconds(5_000.0);
        let sv = obt.state_at(ut, MU);
        let back = sv.into_orbit(MU, 1e-11);
        assert!((back.eccentricity - 0.2).abs() < 1e-9);
        assert!((back.semi_major_axis - 900_000.0).abs() < 1e-3);
        assert!((back.inclination - 28.5).abs() < 1e-9);
        assert!((back.lan - 40.0).abs() < 1e-8);
        assert!((back.argument_of_periapsis - 70.0).abs() < 1e-8);
        let sv2 = back.state_at(ut, MU);
        assert_close(sv2.position, sv.position, 1e-9);
        assert_close(sv2.velocity, sv.velocity, 1e-9);
    }

    #[test]
    fn state_vector_round_trip_hyperbolic() {
        let obt = orbit(10.0, 1.5, -2_000_000.0, 200.0, 15.0, 0.4);
        let ut = UT::new_seconds(150.0);
        let sv = obt.state_at(ut, MU);
        let back = sv.into_orbit(MU, 1e-11);
        assert!(back.semi_major_axis < 0.0);
        assert!((back.eccentricity - 1.5).abs() < 1e-9);
        assert_close(back.position_at(ut, MU), sv.position, 1e-9);
        assert_close(back.velocity_at(ut, MU), sv.velocity, 1e-9);
    }

    #[test]
    fn equatorial_and_circular_orbits_reproduce_position() {
        let ut = UT::new_seconds(42.0);
        for i in [0.0, 180.0] {
            let obt = orbit(i, 0.0, 700_000.0, 0.0, 0.0, 2.0);
            let sv = obt.state_at(ut, MU);
            let back = sv.into_orbit(MU, 1e-11);
            assert_close(back.position_at(ut, MU), sv.position, 1e-9);
            assert_close(back.velocity_at(ut, MU), sv.velocity, 1e-9);
        }
    }

    #[test]
    fn orbit_is_periodic() {
        let obt = orbit(5.0, 0.3, 1_000_000.0, 10.0, 20.0, 0.0);
        let period = TAU / obt.mean_motion(MU);
        let a = obt.position_at(UT::new_seconds(100.0), MU);
        let b = obt.position_at(UT::new_seconds(100.0 + period), MU);
        assert_close(a, b, 1e-6);
    }

    #[test]
    fn kepler_solvers_invert() {
        for &(ma, e) in &[(0.3, 0.1), (3.0, 0.9), (5.5, 0.5)] {
            let ta = ma_to_ta(ma, e, KEPLER_TOL, KEPLER_MAXITER);
            assert!((ta_to_ma(ta, e).rem_euclid(TAU) - ma).abs() < 1e-9);
        }
        for &(ma, e) in &[(0.3, 1.1), (-4.0, 2.0), (25.0, 1.5)] {
            let ta = ma_to_ta(ma, e, KEPLER_TOL, KEPLER_MAXITER);
            assert!((ta_to_ma(ta, e) - ma).abs() < 1e-7 * ma.abs().max(1.0));
        }
    }
}

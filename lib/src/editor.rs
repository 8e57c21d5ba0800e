//! Orbit editing.
//!
//! The free functions convert between the parameterizations the operator
//! works in (circular altitude, raw elements, normalized sliders,
//! velocity changes, rendezvous) and [`Orbit`]s. [`OrbitEditor`] commits
//! the result to the live simulation, validating it first.

use std::{
    f64::consts::{FRAC_PI_2, TAU},
    fmt,
    str::FromStr,
};

use itertools::Itertools;
use nalgebra::Vector3;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    bodies::{Body, BodyId},
    debounce::Debouncer,
    error::{Bound, EditError, EditResult},
    geodesy::{modulo, parse_si},
    host::{Host, OrbitTarget, SoiChange, VesselId},
    kepler::orbits::{Orbit, StateVector},
    time::UT,
};

/// Inclination and longitude of ascending node are never exactly zero.
pub const ANGLE_EPSILON: f64 = 1e-4;
/// Eccentricity slider range, in radians of `atan(e)`.
pub const GRAPHICAL_ECCENTRICITY_RANGE: f64 = FRAC_PI_2 - 0.001;
/// Height above the atmosphere of the lowest periapsis on the slider.
pub const GRAPHICAL_PERIAPSIS_MARGIN: f64 = 1000.0;
/// Height above the atmosphere used when no semi-major axis is given.
pub const FALLBACK_ALTITUDE_MARGIN: f64 = 10_000.0;
pub const MIN_SIMPLE_ALTITUDE: f64 = 1000.0;
pub const DEFAULT_SIMPLE_ALTITUDE: f64 = 100_000.0;

const HYPERBOLIC_ANOMALY_SCALE: f64 = 4.0;
const STATE_VECTOR_TOL: f64 = 1e-11;

/// Six classical elements plus an epoch in seconds, as entered by the
/// operator. Any field may be `NaN`; see [`create_orbit`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Elements {
    pub inclination: f64,
    pub eccentricity: f64,
    pub semi_major_axis: f64,
    pub lan: f64,
    pub argument_of_periapsis: f64,
    pub mean_anomaly_at_epoch: f64,
    pub epoch: f64,
}

impl Elements {
    pub fn from_orbit(orbit: &Orbit) -> Self {
        Self {
            inclination: orbit.inclination,
            eccentricity: orbit.eccentricity,
            semi_major_axis: orbit.semi_major_axis,
            lan: orbit.lan,
            argument_of_periapsis: orbit.argument_of_periapsis,
            mean_anomaly_at_epoch: orbit.mean_anomaly_at_epoch,
            epoch: orbit.epoch.as_seconds(),
        }
    }
}

/// Slider positions in `[0, 1]` for an orbit around a particular body.
///
/// Periapsis is logarithmic between the top of the atmosphere and the
/// sphere of influence, eccentricity is `atan(e)` scaled to
/// [`GRAPHICAL_ECCENTRICITY_RANGE`], angles are fractions of a turn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphicalElements {
    pub inclination: f64,
    pub eccentricity: f64,
    pub periapsis: f64,
    pub lan: f64,
    pub argument_of_periapsis: f64,
    pub mean_anomaly: f64,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, FromPrimitive,
    IntoPrimitive,
)]
#[repr(i32)]
pub enum VelocityDirection {
    #[default]
    Prograde = 0,
    Normal = 1,
    Radial = 2,
    North = 3,
    East = 4,
    Up = 5,
}

impl VelocityDirection {
    pub const ALL: [VelocityDirection; 6] = [
        VelocityDirection::Prograde,
        VelocityDirection::Normal,
        VelocityDirection::Radial,
        VelocityDirection::North,
        VelocityDirection::East,
        VelocityDirection::Up,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VelocityDirection::Prograde => "prograde",
            VelocityDirection::Normal => "normal",
            VelocityDirection::Radial => "radial",
            VelocityDirection::North => "north",
            VelocityDirection::East => "east",
            VelocityDirection::Up => "up",
        }
    }
}

impl fmt::Display for VelocityDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VelocityDirection {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EditError::InvalidInput(format!("unknown direction `{s}`")))
    }
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Build an orbit around `body` from operator-entered elements.
///
/// Degenerate input is corrected rather than rejected: a zero or `NaN`
/// inclination or ascending node becomes [`ANGLE_EPSILON`], a `NaN`
/// semi-major axis becomes a low orbit just above the atmosphere, other
/// `NaN`s become zero, and a non-finite epoch puts the current time into
/// the mean anomaly (and the epoch). The sign of the semi-major axis is
/// flipped to agree with the eccentricity, and closed orbits get their
/// mean anomaly wrapped into `[0, 2π)`.
pub fn create_orbit(elements: Elements, body_id: BodyId, body: &Body, now: UT) -> Orbit {
    let Elements {
        mut inclination,
        mut eccentricity,
        mut semi_major_axis,
        mut lan,
        mut argument_of_periapsis,
        mut mean_anomaly_at_epoch,
        epoch,
    } = elements;

    if inclination == 0.0 || inclination.is_nan() {
        inclination = ANGLE_EPSILON;
    }
    if eccentricity.is_nan() {
        eccentricity = 0.0;
    }
    eccentricity = eccentricity.abs();
    if semi_major_axis.is_nan() {
        semi_major_axis = body.radius + body.atmosphere_depth + FALLBACK_ALTITUDE_MARGIN;
    }
    if lan == 0.0 || lan.is_nan() {
        lan = ANGLE_EPSILON;
    }
    if argument_of_periapsis.is_nan() {
        argument_of_periapsis = 0.0;
    }
    if mean_anomaly_at_epoch.is_nan() {
        mean_anomaly_at_epoch = 0.0;
    }
    let epoch = if !epoch.is_finite() {
        mean_anomaly_at_epoch = now.as_seconds();
        now
    } else {
        UT::new_seconds(epoch)
    };

    if sign(eccentricity - 1.0) == sign(semi_major_axis) {
        semi_major_axis = -semi_major_axis;
    }
    if semi_major_axis >= 0.0 {
        mean_anomaly_at_epoch = mean_anomaly_at_epoch.rem_euclid(TAU);
    }

    Orbit {
        inclination,
        eccentricity,
        semi_major_axis,
        lan,
        argument_of_periapsis,
        mean_anomaly_at_epoch,
        epoch,
        body: body_id,
    }
}

/// Circular equatorial orbit `altitude` metres above the surface.
pub fn simple_orbit(altitude: f64, body_id: BodyId, body: &Body, now: UT) -> Orbit {
    create_orbit(
        Elements {
            inclination: 0.0,
            eccentricity: 0.0,
            semi_major_axis: altitude + body.radius,
            lan: 0.0,
            argument_of_periapsis: 0.0,
            mean_anomaly_at_epoch: 0.0,
            epoch: 0.0,
        },
        body_id,
        body,
        now,
    )
}

fn periapsis_ratio(body: &Body) -> f64 {
    body.safe_soi() / (body.radius + body.atmosphere_depth + GRAPHICAL_PERIAPSIS_MARGIN)
}

/// Orbit described by slider positions.
pub fn graphical_orbit(
    g: GraphicalElements,
    epoch: f64,
    body_id: BodyId,
    body: &Body,
    now: UT,
) -> Orbit {
    let soi = body.safe_soi();
    let ratio = periapsis_ratio(body);
    let periapsis = libm::pow(ratio, g.periapsis) / ratio * soi;
    let eccentricity = libm::tan(g.eccentricity * GRAPHICAL_ECCENTRICITY_RANGE);
    let semi_major_axis = periapsis / (1.0 - eccentricity);

    let mut mean_anomaly = g.mean_anomaly;
    if semi_major_axis < 0.0 {
        mean_anomaly -= 0.5;
        mean_anomaly *= eccentricity * HYPERBOLIC_ANOMALY_SCALE;
    }

    create_orbit(
        Elements {
            inclination: g.inclination * 360.0,
            eccentricity,
            semi_major_axis,
            lan: g.lan * 360.0,
            argument_of_periapsis: g.argument_of_periapsis * 360.0,
            mean_anomaly_at_epoch: mean_anomaly * TAU,
            epoch,
        },
        body_id,
        body,
        now,
    )
}

/// Slider positions reproducing `orbit`, plus its epoch.
pub fn graphical_from_orbit(orbit: &Orbit, body: &Body) -> (GraphicalElements, UT) {
    let soi = body.safe_soi();
    let ratio = periapsis_ratio(body);
    let periapsis =
        libm::log(orbit.periapsis_radius() / soi * ratio) / libm::log(ratio);

    let mut mean_anomaly = orbit.mean_anomaly_at_epoch / TAU;
    if orbit.semi_major_axis < 0.0 {
        mean_anomaly /= orbit.eccentricity * HYPERBOLIC_ANOMALY_SCALE;
        mean_anomaly += 0.5;
    }

    let g = GraphicalElements {
        inclination: modulo(orbit.inclination / 360.0, 1.0),
        eccentricity: libm::atan(orbit.eccentricity) / GRAPHICAL_ECCENTRICITY_RANGE,
        periapsis,
        lan: modulo(orbit.lan / 360.0, 1.0),
        argument_of_periapsis: modulo(orbit.argument_of_periapsis / 360.0, 1.0),
        mean_anomaly,
    };
    (g, orbit.epoch)
}

/// Altitude to show for a circular orbit matching `orbit`: the
/// semi-major axis, else the apoapsis, else a default.
pub fn simple_from_orbit(orbit: &Orbit, body: &Body) -> f64 {
    let altitude = orbit.semi_major_axis - body.radius;
    if altitude > MIN_SIMPLE_ALTITUDE {
        return altitude;
    }
    let apoapsis = orbit.semi_major_axis * (1.0 + orbit.eccentricity) - body.radius;
    if apoapsis > MIN_SIMPLE_ALTITUDE {
        return apoapsis;
    }
    DEFAULT_SIMPLE_ALTITUDE
}

/// Velocity change of magnitude `speed` in `direction`, for an object at
/// `position` moving at `velocity` in an orbit with unit normal `normal`.
pub fn velocity_delta(
    direction: VelocityDirection,
    speed: f64,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    normal: Vector3<f64>,
) -> Vector3<f64> {
    let up = position;
    let axis = Vector3::z();
    let basis = match direction {
        VelocityDirection::Prograde => velocity,
        VelocityDirection::Normal => normal,
        VelocityDirection::Radial => velocity.cross(&normal),
        VelocityDirection::North => up.cross(&axis).cross(&up),
        VelocityDirection::East => axis.cross(&up),
        VelocityDirection::Up => up,
    };
    basis.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros) * speed
}

/// `orbit` after an instantaneous velocity change at `now`.
pub fn velocity_orbit(
    orbit: &Orbit,
    mu: f64,
    now: UT,
    direction: VelocityDirection,
    speed: f64,
) -> Orbit {
    let state = orbit.state_at(now, mu);
    let delta = velocity_delta(direction, speed, state.position, state.velocity, orbit.normal());
    StateVector {
        velocity: state.velocity + delta,
        ..state
    }
    .into_orbit(mu, STATE_VECTOR_TOL)
}

/// The orbit of `target`, shifted `lead_time` seconds ahead of it.
pub fn rendezvous_orbit(target: &Orbit, lead_time: f64, body: &Body, now: UT) -> Orbit {
    let mut elements = Elements::from_orbit(target);
    elements.epoch -= lead_time;
    create_orbit(elements, target.body, body, now)
}

fn lookup_body(host: &impl Host, id: BodyId) -> EditResult<&Body> {
    host.body(id).ok_or(EditError::UnknownBody(id))
}

/// The live orbit of `target`.
pub fn current_orbit(host: &impl Host, target: OrbitTarget) -> EditResult<Orbit> {
    match target {
        OrbitTarget::Vessel(id) => host
            .vessel(id)
            .map(|v| v.orbit)
            .ok_or(EditError::UnknownVessel(id)),
        OrbitTarget::Body(id) => {
            let body = lookup_body(&*host, id)?;
            body.ephem.ok_or_else(|| EditError::NoOrbit(body.name.clone()))
        }
    }
}

pub fn target_name(host: &impl Host, target: OrbitTarget) -> String {
    match target {
        OrbitTarget::Vessel(id) => host
            .vessel(id)
            .map_or_else(|| format!("{id:?}"), |v| v.name.clone()),
        OrbitTarget::Body(id) => host
            .body(id)
            .map_or_else(|| format!("{id:?}"), |b| b.name.clone()),
    }
}

/// Everything whose orbit can be edited: the active vessel first, then
/// every vessel, then every body that orbits something.
pub fn editable_targets(host: &impl Host) -> Vec<OrbitTarget> {
    let bodies = host
        .body_ids()
        .into_iter()
        .filter(|&id| host.body(id).is_some_and(|b| !b.is_star && b.ephem.is_some()));
    host.active_vessel()
        .into_iter()
        .chain(host.vessel_ids())
        .map(OrbitTarget::Vessel)
        .chain(bodies.map(OrbitTarget::Body))
        .unique()
        .collect()
}

pub fn get_simple(host: &impl Host, target: OrbitTarget) -> EditResult<(f64, BodyId)> {
    let orbit = current_orbit(&*host, target)?;
    let body = lookup_body(&*host, orbit.body)?;
    Ok((simple_from_orbit(&orbit, body), orbit.body))
}

pub fn get_complex(host: &impl Host, target: OrbitTarget) -> EditResult<(Elements, BodyId)> {
    let orbit = current_orbit(&*host, target)?;
    Ok((Elements::from_orbit(&orbit), orbit.body))
}

pub fn get_graphical(host: &impl Host, target: OrbitTarget) -> EditResult<(GraphicalElements, UT)> {
    let orbit = current_orbit(&*host, target)?;
    let body = lookup_body(&*host, orbit.body)?;
    Ok(graphical_from_orbit(&orbit, body))
}

/// Velocity edits are relative, so the fields always start out empty.
pub fn get_velocity(host: &impl Host, target: OrbitTarget) -> EditResult<(VelocityDirection, f64)> {
    current_orbit(&*host, target)?;
    Ok((VelocityDirection::Prograde, 0.0))
}

/// Is `descendant` equal to `ancestor` or (transitively) one of its
/// satellites?
fn is_descendant(host: &impl Host, descendant: BodyId, ancestor: BodyId) -> bool {
    let mut cursor = Some(descendant);
    while let Some(id) = cursor {
        if id == ancestor {
            return true;
        }
        cursor = host.body(id).and_then(|b| b.parent);
    }
    false
}

/// Applies edits to the live simulation.
#[derive(Debug, Default)]
pub struct OrbitEditor {
    log: Debouncer<OrbitTarget>,
}

impl OrbitEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the diagnostic rate limiter. Call once per frame.
    pub fn tick(&mut self) {
        self.log.tick();
    }

    pub fn apply_simple(
        &mut self,
        host: &mut impl Host,
        target: OrbitTarget,
        body: BodyId,
        altitude: f64,
    ) -> EditResult {
        let orbit = simple_orbit(altitude, body, lookup_body(&*host, body)?, host.universal_time());
        self.set_orbit(host, target, orbit)
    }

    pub fn apply_complex(
        &mut self,
        host: &mut impl Host,
        target: OrbitTarget,
        elements: Elements,
        body: BodyId,
    ) -> EditResult {
        let orbit = create_orbit(elements, body, lookup_body(&*host, body)?, host.universal_time());
        self.set_orbit(host, target, orbit)
    }

    /// Sliders are relative to the body `target` currently orbits.
    pub fn apply_graphical(
        &mut self,
        host: &mut impl Host,
        target: OrbitTarget,
        g: GraphicalElements,
        epoch: f64,
    ) -> EditResult {
        let body_id = current_orbit(&*host, target)?.body;
        let orbit = graphical_orbit(g, epoch, body_id, lookup_body(&*host, body_id)?, host.universal_time());
        self.set_orbit(host, target, orbit)
    }

    pub fn apply_velocity(
        &mut self,
        host: &mut impl Host,
        target: OrbitTarget,
        direction: VelocityDirection,
        speed: f64,
    ) -> EditResult {
        let current = current_orbit(&*host, target)?;
        let mu = lookup_body(&*host, current.body)?.mu;
        let orbit = velocity_orbit(&current, mu, host.universal_time(), direction, speed);
        self.set_orbit(host, target, orbit)
    }

    /// Put `target` in the orbit of vessel `with`, `lead_time` seconds
    /// ahead of it. Only vessels can rendezvous.
    pub fn apply_rendezvous(
        &mut self,
        host: &mut impl Host,
        target: OrbitTarget,
        with: VesselId,
        lead_time: f64,
    ) -> EditResult {
        if let OrbitTarget::Body(_) = target {
            return Err(EditError::InvalidInput(
                "only vessels can rendezvous".into(),
            ));
        }
        let other = current_orbit(&*host, OrbitTarget::Vessel(with))?;
        let orbit = rendezvous_orbit(
            &other,
            lead_time,
            lookup_body(&*host, other.body)?,
            host.universal_time(),
        );
        self.set_orbit(host, target, orbit)
    }

    /// Commit `orbit` to `target`. Vessels are checked against the
    /// bounds of the new reference body first; a rejected orbit leaves
    /// the simulation untouched.
    pub fn set_orbit(&mut self, host: &mut impl Host, target: OrbitTarget, orbit: Orbit) -> EditResult {
        match target {
            OrbitTarget::Vessel(id) => self.set_vessel_orbit(host, id, orbit)?,
            OrbitTarget::Body(id) => self.set_body_orbit(host, id, orbit)?,
        }
        self.log.log(
            target,
            format!(
                "orbit of {} changed to: inc={} ecc={} sma={} lan={} argpe={} mep={} epoch={} refbody={}",
                target_name(&*host, target),
                orbit.inclination,
                orbit.eccentricity,
                orbit.semi_major_axis,
                orbit.lan,
                orbit.argument_of_periapsis,
                orbit.mean_anomaly_at_epoch,
                orbit.epoch,
                target_name(&*host, OrbitTarget::Body(orbit.body)),
            ),
        );
        Ok(())
    }

    fn set_vessel_orbit(&mut self, host: &mut impl Host, id: VesselId, orbit: Orbit) -> EditResult {
        let old_body = host.vessel(id).ok_or(EditError::UnknownVessel(id))?.body();
        let body = lookup_body(&*host, orbit.body)?;

        let distance = orbit.position_at(host.universal_time(), body.mu).norm();
        let rejection = if !distance.is_finite() {
            Some((Bound::NonFinite, body.soi))
        } else if distance > body.soi {
            Some((Bound::AboveSphereOfInfluence, body.soi))
        } else if distance < body.radius {
            Some((Bound::BelowSurface, body.radius))
        } else {
            None
        };
        if let Some((bound, limit)) = rejection {
            warn!(?id, distance, limit, "destination position was {bound}");
            return Err(EditError::OutOfBoundsTarget {
                distance,
                limit,
                bound,
            });
        }

        host.suspend_physics();
        let written = host.hardset_orbit(OrbitTarget::Vessel(id), orbit);
        host.resume_physics();
        written?;

        if let Some(vessel) = host.vessel_mut(id) {
            vessel.landed = false;
            vessel.splashed = false;
            vessel.landed_at.clear();
        }
        host.release_launch_clamps(id);

        if orbit.body != old_body {
            info!(?id, from = ?old_body, to = ?orbit.body, "vessel changed sphere of influence");
            host.fire_soi_change(SoiChange {
                vessel: id,
                from: old_body,
                to: orbit.body,
            });
        }
        Ok(())
    }

    fn set_body_orbit(&mut self, host: &mut impl Host, id: BodyId, orbit: Orbit) -> EditResult {
        let body = lookup_body(&*host, id)?;
        if body.is_star || body.ephem.is_none() {
            return Err(EditError::NoOrbit(body.name.clone()));
        }
        let old_parent = body.parent;
        let parent_mu = lookup_body(&*host, orbit.body)?.mu;
        if is_descendant(&*host, orbit.body, id) {
            return Err(EditError::InvalidReference {
                body: target_name(&*host, OrbitTarget::Body(id)),
                reference: target_name(&*host, OrbitTarget::Body(orbit.body)),
            });
        }

        host.hardset_orbit(OrbitTarget::Body(id), orbit)?;
        if old_parent != Some(orbit.body) {
            info!(?id, from = ?old_parent, to = ?orbit.body, "body changed parent");
            host.reparent_body(id, old_parent, orbit.body)?;
        }
        if let Some(body) = host.body_mut(id) {
            body.refresh_spheres(parent_mu);
        }
        Ok(())
    }
}

/// Text fields of the complex-elements editor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplexFields {
    pub inclination: String,
    pub eccentricity: String,
    pub semi_major_axis: String,
    pub lan: String,
    pub argument_of_periapsis: String,
    pub mean_anomaly_at_epoch: String,
    pub epoch: String,
}

impl Default for ComplexFields {
    fn default() -> Self {
        Self {
            inclination: "0".into(),
            eccentricity: "0".into(),
            semi_major_axis: "10000000".into(),
            lan: "0".into(),
            argument_of_periapsis: "0".into(),
            mean_anomaly_at_epoch: "0".into(),
            epoch: "0".into(),
        }
    }
}

fn parse_plain(name: &str, text: &str) -> EditResult<f64> {
    text.trim()
        .parse()
        .map_err(|_| EditError::InvalidInput(format!("{name}: `{text}` is not a number")))
}

fn parse_suffixed(name: &str, text: &str) -> EditResult<f64> {
    parse_si(text).map_err(|e| EditError::InvalidInput(format!("{name}: {e}")))
}

impl ComplexFields {
    pub fn parse(&self) -> EditResult<Elements> {
        Ok(Elements {
            inclination: parse_plain("inclination", &self.inclination)?,
            eccentricity: parse_plain("eccentricity", &self.eccentricity)?,
            semi_major_axis: parse_suffixed("semi-major axis", &self.semi_major_axis)?,
            lan: parse_plain("longitude of ascending node", &self.lan)?,
            argument_of_periapsis: parse_plain("argument of periapsis", &self.argument_of_periapsis)?,
            mean_anomaly_at_epoch: parse_plain("mean anomaly at epoch", &self.mean_anomaly_at_epoch)?,
            epoch: parse_suffixed("epoch", &self.epoch)?,
        })
    }

    fn fill(&mut self, e: &Elements) {
        self.inclination = e.inclination.to_string();
        self.eccentricity = e.eccentricity.to_string();
        self.semi_major_axis = e.semi_major_axis.to_string();
        self.lan = e.lan.to_string();
        self.argument_of_periapsis = e.argument_of_periapsis.to_string();
        self.mean_anomaly_at_epoch = e.mean_anomaly_at_epoch.to_string();
        self.epoch = e.epoch.to_string();
    }
}

/// Current values of every field of an orbit editing session.
///
/// Selecting a target fills the fields from its orbit; each `apply_*`
/// parses the relevant group and hands it to the [`OrbitEditor`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditorFields {
    pub target: Option<OrbitTarget>,
    pub reference: Option<BodyId>,
    pub simple_altitude: String,
    pub complex: ComplexFields,
    pub graphical: GraphicalElements,
    pub graphical_epoch: f64,
    pub velocity_direction: VelocityDirection,
    pub velocity_speed: String,
    pub rendezvous_lead_time: String,
    pub rendezvous_with: Option<VesselId>,
}

impl Default for EditorFields {
    fn default() -> Self {
        Self {
            target: None,
            reference: None,
            simple_altitude: "110000".into(),
            complex: ComplexFields::default(),
            graphical: GraphicalElements::default(),
            graphical_epoch: 0.0,
            velocity_direction: VelocityDirection::Prograde,
            velocity_speed: "0".into(),
            rendezvous_lead_time: "1".into(),
            rendezvous_with: None,
        }
    }
}

impl EditorFields {
    pub fn select(&mut self, host: &impl Host, target: OrbitTarget) -> EditResult {
        current_orbit(&*host, target)?;
        self.target = Some(target);
        self.refresh(&*host)
    }

    /// Re-read every field group from the selected target.
    pub fn refresh(&mut self, host: &impl Host) -> EditResult {
        let target = self.selected()?;
        let (altitude, body) = get_simple(host, target)?;
        self.simple_altitude = altitude.to_string();
        self.reference = Some(body);

        let (elements, _) = get_complex(host, target)?;
        self.complex.fill(&elements);

        let (g, epoch) = get_graphical(host, target)?;
        self.graphical = g;
        self.graphical_epoch = epoch.as_seconds();

        let (direction, speed) = get_velocity(host, target)?;
        self.velocity_direction = direction;
        self.velocity_speed = speed.to_string();
        Ok(())
    }

    fn selected(&self) -> EditResult<OrbitTarget> {
        self.target
            .ok_or_else(|| EditError::InvalidInput("nothing selected".into()))
    }

    fn reference(&self) -> EditResult<BodyId> {
        self.reference
            .ok_or_else(|| EditError::InvalidInput("no reference body selected".into()))
    }

    pub fn apply_simple(&mut self, editor: &mut OrbitEditor, host: &mut impl Host) -> EditResult {
        let altitude = parse_suffixed("altitude", &self.simple_altitude)?;
        editor.apply_simple(host, self.selected()?, self.reference()?, altitude)?;
        self.refresh(&*host)
    }

    pub fn apply_complex(&mut self, editor: &mut OrbitEditor, host: &mut impl Host) -> EditResult {
        let elements = self.complex.parse()?;
        editor.apply_complex(host, self.selected()?, elements, self.reference()?)?;
        self.refresh(&*host)
    }

    pub fn apply_graphical(&mut self, editor: &mut OrbitEditor, host: &mut impl Host) -> EditResult {
        editor.apply_graphical(host, self.selected()?, self.graphical, self.graphical_epoch)?;
        self.refresh(&*host)
    }

    pub fn apply_velocity(&mut self, editor: &mut OrbitEditor, host: &mut impl Host) -> EditResult {
        let speed = parse_suffixed("speed", &self.velocity_speed)?;
        editor.apply_velocity(host, self.selected()?, self.velocity_direction, speed)
    }

    pub fn apply_rendezvous(&mut self, editor: &mut OrbitEditor, host: &mut impl Host) -> EditResult {
        let lead_time = parse_suffixed("lead time", &self.rendezvous_lead_time)?;
        let with = self
            .rendezvous_with
            .ok_or_else(|| EditError::InvalidInput("no rendezvous vessel selected".into()))?;
        editor.apply_rendezvous(host, self.selected()?, with, lead_time)
    }
}

//! Terrain-relative landing.
//!
//! A [`LandingSession`] is attached to one vessel. Each physics tick it
//! moves the vessel to the target coordinates at an interim altitude that
//! shrinks by [`LandingTuning::descent_divisor`] every
//! [`LandingTuning::reduction_interval`] seconds, then places it just
//! above the terrain and damps its velocity until the host reports it
//! grounded.

use std::{collections::BTreeMap, f64::consts::PI, fmt};

use nalgebra::{Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::{
    bodies::{Body, BodyId},
    debounce::Debouncer,
    editor::OrbitEditor,
    error::{EditError, EditResult},
    geodesy::{destination_point, normalize_angle, parse_dms, parse_si},
    host::{Host, OrbitTarget, Vessel, VesselId},
    kepler::orbits::StateVector,
    terrain,
};

/// Coordinate value substituted for an exact zero when a session starts.
const ZERO_SUBSTITUTE: f64 = 0.001;
/// Coordinate value substituted for an exact zero after a nudge.
const NUDGE_ZERO_SUBSTITUTE: f64 = 0.0001;
pub const MAX_LATITUDE: f64 = 89.9;
const STATE_VECTOR_TOL: f64 = 1e-11;

/// Descent constants.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingTuning {
    /// Interim altitude is divided by this at every reduction.
    pub descent_divisor: f64,
    /// Minimum simulated time between reductions (`s`).
    pub reduction_interval: f64,
    /// Starting interim altitude above radius plus atmosphere (`m`).
    pub safe_margin: f64,
    /// Distance moved by one nudge (`m`).
    pub nudge_step: f64,
    /// Fraction of surface velocity removed per tick while settling.
    pub settle_damping: f64,
}

impl Default for LandingTuning {
    fn default() -> Self {
        Self {
            descent_divisor: 10.0,
            reduction_interval: 0.5,
            safe_margin: 10_000.0,
            nudge_step: 20.0,
            settle_damping: 0.5,
        }
    }
}

/// Called with `(lat, lon, alt, body)` whenever the session moves its
/// target on its own.
pub type ManualEditCallback = Box<dyn FnMut(f64, f64, f64, BodyId)>;

/// Where to land. Angles in degrees, `alt` is above the terrain.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandingTarget {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub body: BodyId,
    /// Point the vessel's up axis along the surface normal.
    pub set_rotation: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LandingPhase {
    /// Descending through interim altitudes.
    Armed,
    /// At the final altitude, waiting for ground contact.
    Settling,
}

/// Why a session ended.
#[derive(Clone, Debug, PartialEq)]
pub enum LandingOutcome {
    Landed,
    /// The vessel is no longer the active one.
    Deactivated,
    Aborted(EditError),
}

pub struct LandingSession {
    pub target: LandingTarget,
    /// Height above sea level of the next teleport while armed.
    pub interim_altitude: f64,
    reached_landing_altitude: bool,
    settled: bool,
    last_update: Option<crate::time::UT>,
    on_manual_edit: Option<ManualEditCallback>,
}

impl LandingSession {
    pub fn new(target: LandingTarget, interim_altitude: f64, on_manual_edit: Option<ManualEditCallback>) -> Self {
        Self {
            target,
            interim_altitude,
            reached_landing_altitude: false,
            settled: false,
            last_update: None,
            on_manual_edit,
        }
    }

    pub fn phase(&self) -> LandingPhase {
        if self.settled {
            LandingPhase::Settling
        } else {
            LandingPhase::Armed
        }
    }

    pub fn reached_landing_altitude(&self) -> bool {
        self.reached_landing_altitude
    }

    /// Move the target. Descent restarts from the current interim
    /// altitude.
    pub fn edit_target(&mut self, lat: f64, lon: f64, alt: f64) {
        self.target.lat = lat;
        self.target.lon = lon;
        self.target.alt = alt;
        self.restart();
    }

    fn restart(&mut self) {
        self.reached_landing_altitude = false;
        self.settled = false;
    }

    fn notify(&mut self) {
        let LandingTarget { lat, lon, alt, body, .. } = self.target;
        if let Some(callback) = self.on_manual_edit.as_mut() {
            callback(lat, lon, alt, body);
        }
    }
}

impl fmt::Debug for LandingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LandingSession")
            .field("target", &self.target)
            .field("interim_altitude", &self.interim_altitude)
            .field("reached_landing_altitude", &self.reached_landing_altitude)
            .field("settled", &self.settled)
            .field("last_update", &self.last_update)
            .finish_non_exhaustive()
    }
}

/// Result of [`Lander::toggle`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped,
}

/// Fine-adjustment keys held this frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NudgeInput {
    pub north: bool,
    pub south: bool,
    pub west: bool,
    pub east: bool,
}

/// All landing sessions, at most one per vessel.
#[derive(Debug)]
pub struct Lander {
    pub tuning: LandingTuning,
    sessions: BTreeMap<VesselId, LandingSession>,
    log: Debouncer<VesselId>,
}

impl Default for Lander {
    fn default() -> Self {
        Self::new(LandingTuning::default())
    }
}

enum Step {
    Continue,
    Finished(LandingOutcome),
}

impl Lander {
    pub fn new(tuning: LandingTuning) -> Self {
        Self {
            tuning,
            sessions: BTreeMap::new(),
            log: Debouncer::new(),
        }
    }

    pub fn is_landing(&self, vessel: VesselId) -> bool {
        self.sessions.contains_key(&vessel)
    }

    pub fn session(&self, vessel: VesselId) -> Option<&LandingSession> {
        self.sessions.get(&vessel)
    }

    pub fn session_mut(&mut self, vessel: VesselId) -> Option<&mut LandingSession> {
        self.sessions.get_mut(&vessel)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every session, e.g. on a scene change.
    pub fn clear(&mut self) {
        if !self.sessions.is_empty() {
            info!(count = self.sessions.len(), "dropping landing sessions");
        }
        self.sessions.clear();
    }

    /// Start landing the active vessel at `target`, or stop if it is
    /// already landing.
    pub fn toggle(
        &mut self,
        host: &impl Host,
        mut target: LandingTarget,
        on_manual_edit: Option<ManualEditCallback>,
    ) -> EditResult<Toggle> {
        let vessel = host
            .active_vessel()
            .ok_or_else(|| EditError::InvalidInput("no active vessel".into()))?;
        if self.sessions.remove(&vessel).is_some() {
            info!(?vessel, "landing cancelled");
            return Ok(Toggle::Stopped);
        }
        let body = host.body(target.body).ok_or(EditError::UnknownBody(target.body))?;

        if target.lat == 0.0 {
            target.lat = ZERO_SUBSTITUTE;
        }
        if target.lon == 0.0 {
            target.lon = ZERO_SUBSTITUTE;
        }
        let interim = body.radius + body.atmosphere_depth + self.tuning.safe_margin;
        info!(
            ?vessel,
            lat = target.lat,
            lon = target.lon,
            alt = target.alt,
            body = %body.name,
            interim,
            "landing started"
        );
        self.sessions
            .insert(vessel, LandingSession::new(target, interim, on_manual_edit));
        Ok(Toggle::Started)
    }

    /// Land the active vessel straight below where it is now, keeping
    /// its height above the terrain and its orientation. Does nothing if
    /// it is already landing.
    pub fn land_here(
        &mut self,
        host: &impl Host,
        on_manual_edit: Option<ManualEditCallback>,
    ) -> EditResult<bool> {
        let id = host
            .active_vessel()
            .ok_or_else(|| EditError::InvalidInput("no active vessel".into()))?;
        if self.sessions.contains_key(&id) {
            return Ok(false);
        }
        let vessel = host.vessel(id).ok_or(EditError::UnknownVessel(id))?;
        let body_id = vessel.body();
        let body = host.body(body_id).ok_or(EditError::UnknownBody(body_id))?;
        let (lat, lon) = body.lat_lon(host.universal_time(), vessel.position);
        let ground = terrain::ideal_height(body, body_id, lat, lon)?.max(0.0);
        let target = LandingTarget {
            lat,
            lon,
            alt: body.altitude(vessel.position) - ground,
            body: body_id,
            set_rotation: false,
        };
        info!(?id, lat, lon, alt = target.alt, "landing here");
        self.sessions
            .insert(id, LandingSession::new(target, 0.0, on_manual_edit));
        Ok(true)
    }

    /// Advance every session by one physics tick. Returns the sessions
    /// that ended during this tick.
    pub fn fixed_update(
        &mut self,
        editor: &mut OrbitEditor,
        host: &mut impl Host,
    ) -> Vec<(VesselId, LandingOutcome)> {
        let active = host.active_vessel();
        let mut finished = vec![];
        let tuning = self.tuning;
        for (&id, session) in &mut self.sessions {
            let step = if Some(id) == active {
                host.cancel_time_warp();
                advance(session, id, editor, host, &tuning, &mut self.log)
                    .unwrap_or_else(|e| Step::Finished(LandingOutcome::Aborted(e)))
            } else {
                Step::Finished(LandingOutcome::Deactivated)
            };
            if let Step::Finished(outcome) = step {
                match &outcome {
                    LandingOutcome::Aborted(e) => warn!(?id, "landing aborted: {e}"),
                    outcome => info!(?id, ?outcome, "landing finished"),
                }
                finished.push((id, outcome));
            }
        }
        for (id, _) in &finished {
            self.sessions.remove(id);
        }
        self.log.tick();
        finished
    }

    /// Per-frame handling of the active vessel's session: keep time warp
    /// off and apply nudges.
    pub fn frame_update(&mut self, host: &mut impl Host, input: NudgeInput) {
        let Some(id) = host.active_vessel() else {
            return;
        };
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        host.cancel_time_warp();
        let Some(radius) = host.body(session.target.body).map(|b| b.radius) else {
            return;
        };

        let step = self.tuning.nudge_step;
        let mut changed = false;
        for (pressed, bearing) in [
            (input.north, 0.0),
            (input.south, 180.0),
            (input.west, 270.0),
            (input.east, 90.0),
        ] {
            if pressed {
                let (lat, lon) =
                    destination_point(session.target.lat, session.target.lon, bearing, step, radius);
                trace!(bearing, lat, lon, "nudge");
                session.target.lat = lat;
                session.target.lon = lon;
                changed = true;
            }
        }

        if session.target.lat == 0.0 {
            session.target.lat = NUDGE_ZERO_SUBSTITUTE;
        }
        if session.target.lon == 0.0 {
            session.target.lon = NUDGE_ZERO_SUBSTITUTE;
        }
        if changed {
            session.restart();
            session.notify();
        }
    }
}

fn advance(
    session: &mut LandingSession,
    id: VesselId,
    editor: &mut OrbitEditor,
    host: &mut impl Host,
    tuning: &LandingTuning,
    log: &mut Debouncer<VesselId>,
) -> EditResult<Step> {
    if session.settled {
        let vessel = host.vessel(id).ok_or(EditError::UnknownVessel(id))?;
        if vessel.grounded() {
            return Ok(Step::Finished(LandingOutcome::Landed));
        }
        let body = host.body(vessel.body()).ok_or(EditError::UnknownBody(vessel.body()))?;
        let surface_velocity = vessel.velocity - body.surface_velocity(vessel.position);
        let up = vessel.position.normalize();
        let damping = -(surface_velocity + up) * tuning.settle_damping;
        host.change_world_velocity(id, damping);
        return Ok(Step::Continue);
    }

    let LandingTarget { lat, lon, alt, body, .. } = session.target;
    let ground = terrain::actual_height(&*host, body, lat, lon)?.max(0.0);
    let floor = ground + alt;

    if !session.reached_landing_altitude && session.interim_altitude > floor {
        let now = host.universal_time();
        let due = session
            .last_update
            .map_or(true, |last| now.seconds_since(last) >= tuning.reduction_interval);
        if due {
            session.interim_altitude /= tuning.descent_divisor;
            if session.interim_altitude < ground {
                session.interim_altitude = floor;
            }
            session.last_update = Some(now);
        }
        log.log(
            id,
            format!("descending: interim altitude {}, terrain {ground}", session.interim_altitude),
        );
        teleport(session, id, editor, host, session.interim_altitude)?;
    } else {
        session.reached_landing_altitude = true;
        debug!(?id, ground, alt, "final approach");
        teleport(session, id, editor, host, floor)?;
        session.settled = true;
    }
    Ok(Step::Continue)
}

/// Place `id` above the target at `altitude` (above sea level), moving
/// with the surface.
fn teleport(
    session: &LandingSession,
    id: VesselId,
    editor: &mut OrbitEditor,
    host: &mut impl Host,
    altitude: f64,
) -> EditResult {
    let LandingTarget {
        lat,
        lon,
        body: body_id,
        set_rotation,
        ..
    } = session.target;
    let now = host.universal_time();
    let body = host.body(body_id).ok_or(EditError::UnknownBody(body_id))?;
    let vessel = host.vessel(id).ok_or(EditError::UnknownVessel(id))?;

    let position = body.surface_position(now, lat, lon, altitude);
    // counter the fall during the first tick on rails
    let velocity = body.surface_velocity(position)
        + position.normalize() * (body.mu / position.norm_squared());
    let rotation = if set_rotation {
        aligned_rotation(vessel, body, now, lat, lon)
    } else {
        carried_rotation(vessel, &position)
    };
    let orbit = StateVector {
        body: body_id,
        position,
        velocity,
        time: now,
    }
    .into_orbit(body.mu, STATE_VECTOR_TOL);

    set_sas(host, id, false);
    let committed = editor.set_orbit(host, OrbitTarget::Vessel(id), orbit);
    if committed.is_ok() {
        if let Some(vessel) = host.vessel_mut(id) {
            vessel.rotation = rotation;
        }
    }
    set_sas(host, id, true);
    committed
}

fn set_sas(host: &mut impl Host, id: VesselId, on: bool) {
    if let Some(vessel) = host.vessel_mut(id) {
        vessel.sas = on;
    }
}

/// Shortest rotation taking `from` onto `to`, with a half turn for
/// opposite vectors.
fn rotation_between(from: &Vector3<f64>, to: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::rotation_between(from, to).unwrap_or_else(|| {
        let helper = if from.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        Unit::try_new(from.cross(&helper), f64::EPSILON).map_or_else(UnitQuaternion::identity, |axis| {
            UnitQuaternion::from_axis_angle(&axis, PI)
        })
    })
}

/// Attitude with the vessel's up along the surface normal. Planes,
/// rovers, bases and anything on a runway instead keep their heading by
/// turning their forward axis onto the normal.
fn aligned_rotation(vessel: &Vessel, body: &Body, now: crate::time::UT, lat: f64, lon: f64) -> UnitQuaternion<f64> {
    let normal = body.fixed_to_inertial(now, Body::surface_normal(lat, lon));
    if vessel.kind.is_surface_craft() || vessel.landed_at == "Runway" {
        let forward = vessel.rotation * Vector3::y();
        rotation_between(&forward, &normal) * vessel.rotation
    } else {
        rotation_between(&Vector3::z(), &normal)
    }
}

/// Current attitude carried along from the old up direction to the new.
fn carried_rotation(vessel: &Vessel, new_position: &Vector3<f64>) -> UnitQuaternion<f64> {
    rotation_between(&vessel.position, new_position) * vessel.rotation
}

/// Landing coordinates matching where `vessel` is now: latitude wrapped
/// into `[-180, 180)` and altitude above the terrain.
pub fn target_from_vessel(host: &impl Host, id: VesselId) -> EditResult<LandingTarget> {
    let vessel = host.vessel(id).ok_or(EditError::UnknownVessel(id))?;
    let body_id = vessel.body();
    let body = host.body(body_id).ok_or(EditError::UnknownBody(body_id))?;
    let (lat, lon) = body.lat_lon(host.universal_time(), vessel.position);
    let ground = terrain::actual_height(host, body_id, lat, lon)
        .unwrap_or(0.0)
        .max(0.0);
    Ok(LandingTarget {
        lat: normalize_angle(lat, -180.0),
        lon,
        alt: body.altitude(vessel.position) - ground,
        body: body_id,
        set_rotation: true,
    })
}

pub fn landed_vessels(host: &impl Host) -> Vec<VesselId> {
    host.vessel_ids()
        .into_iter()
        .filter(|&id| host.vessel(id).is_some_and(|v| v.landed))
        .collect()
}

/// Latitude field: degrees or `d:m:s`, within ±[`MAX_LATITUDE`]. Zero
/// becomes 0.001.
pub fn parse_latitude(text: &str) -> EditResult<f64> {
    let lat = parse_dms(text).map_err(|e| EditError::InvalidInput(format!("latitude: {e}")))?;
    if lat == 0.0 {
        return Ok(ZERO_SUBSTITUTE);
    }
    if !(-MAX_LATITUDE..=MAX_LATITUDE).contains(&lat) {
        return Err(EditError::InvalidInput(format!(
            "latitude must be between -{MAX_LATITUDE} and {MAX_LATITUDE}"
        )));
    }
    Ok(lat)
}

/// Longitude field: any number of degrees. Zero becomes 0.001.
pub fn parse_longitude(text: &str) -> EditResult<f64> {
    let lon = parse_dms(text).map_err(|e| EditError::InvalidInput(format!("longitude: {e}")))?;
    if lon.is_nan() {
        return Err(EditError::InvalidInput("longitude: not a number".into()));
    }
    Ok(if lon == 0.0 { ZERO_SUBSTITUTE } else { lon })
}

/// Altitude field: metres above the terrain with an optional metric
/// suffix, not negative. Zero becomes 0.001.
pub fn parse_altitude(text: &str) -> EditResult<f64> {
    let alt = parse_si(text).map_err(|e| EditError::InvalidInput(format!("altitude: {e}")))?;
    if alt == 0.0 {
        return Ok(ZERO_SUBSTITUTE);
    }
    if alt.is_nan() || alt < 0.0 {
        return Err(EditError::InvalidInput("altitude must be a positive number".into()));
    }
    Ok(alt)
}

/// Text fields of the landing panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandingFields {
    pub body: Option<BodyId>,
    pub lat: String,
    pub lon: String,
    pub alt: String,
    pub set_rotation: bool,
}

impl Default for LandingFields {
    fn default() -> Self {
        Self {
            body: None,
            lat: ZERO_SUBSTITUTE.to_string(),
            lon: ZERO_SUBSTITUTE.to_string(),
            alt: "20".into(),
            set_rotation: true,
        }
    }
}

impl LandingFields {
    pub fn parse(&self) -> EditResult<LandingTarget> {
        Ok(LandingTarget {
            lat: parse_latitude(&self.lat)?,
            lon: parse_longitude(&self.lon)?,
            alt: parse_altitude(&self.alt)?,
            body: self
                .body
                .ok_or_else(|| EditError::InvalidInput("no body selected".into()))?,
            set_rotation: self.set_rotation,
        })
    }

    /// Overwrite the coordinates, e.g. from a saved record or a callback.
    pub fn load(&mut self, lat: f64, lon: f64, alt: f64, body: BodyId) {
        self.lat = lat.to_string();
        self.lon = lon.to_string();
        self.alt = alt.to_string();
        self.body = Some(body);
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{arena::IdLike, editor::simple_orbit, host::VesselType, sim::Simulation, time::UT};

    const DT: f64 = 0.02;

    fn setup() -> (Simulation, BodyId, VesselId) {
        let mut sim = Simulation::kerbol();
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        let orbit = simple_orbit(100_000.0, kerbin, sim.body(kerbin).unwrap(), UT::ZERO);
        let ship = sim.add_vessel("Ship", VesselType::Ship, orbit);
        sim.active = Some(ship);
        (sim, kerbin, ship)
    }

    fn target(body: BodyId) -> LandingTarget {
        LandingTarget {
            lat: -0.0972,
            lon: 285.4423,
            alt: 20.0,
            body,
            set_rotation: true,
        }
    }

    #[test]
    fn toggle_starts_and_stops() {
        let (sim, kerbin, ship) = setup();
        let mut lander = Lander::default();
        let mut t = target(kerbin);
        t.lat = 0.0;
        assert_eq!(lander.toggle(&sim, t, None), Ok(Toggle::Started));
        let session = lander.session(ship).unwrap();
        assert_eq!(session.target.lat, ZERO_SUBSTITUTE);
        assert_eq!(session.interim_altitude, 600_000.0 + 70_000.0 + 10_000.0);
        assert_eq!(session.phase(), LandingPhase::Armed);
        assert_eq!(lander.toggle(&sim, t, None), Ok(Toggle::Stopped));
        assert!(lander.is_empty());
    }

    #[test]
    fn interim_altitude_divides_until_settling() {
        let (mut sim, kerbin, ship) = setup();
        sim.flatten_terrain(kerbin, 0.0);
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        lander.toggle(&sim, target(kerbin), None).unwrap();
        lander.session_mut(ship).unwrap().interim_altitude = 110_000.0;

        let mut seen = vec![];
        for _ in 0..4 {
            assert!(lander.fixed_update(&mut editor, &mut sim).is_empty());
            let session = lander.session(ship).unwrap();
            assert_eq!(session.phase(), LandingPhase::Armed);
            seen.push(session.interim_altitude);
            let body = sim.body(kerbin).unwrap();
            let alt = body.altitude(sim.vessel(ship).unwrap().position);
            assert!((alt - session.interim_altitude).abs() < 1e-2, "{alt}");
            sim.step(0.5);
        }
        let expected = [11_000.0, 1_100.0, 110.0, 11.0];
        for (a, b) in seen.iter().zip(expected) {
            assert!((a - b).abs() < 1e-9, "{seen:?}");
        }

        lander.fixed_update(&mut editor, &mut sim);
        let session = lander.session(ship).unwrap();
        assert_eq!(session.phase(), LandingPhase::Settling);
        assert!(session.reached_landing_altitude());
        let alt = sim.body(kerbin).unwrap().altitude(sim.vessel(ship).unwrap().position);
        assert!((alt - 20.0).abs() < 1e-2);
    }

    #[test]
    fn undershoot_snaps_to_terrain_floor() {
        let (mut sim, kerbin, ship) = setup();
        sim.flatten_terrain(kerbin, 500.0);
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        lander.toggle(&sim, target(kerbin), None).unwrap();
        lander.session_mut(ship).unwrap().interim_altitude = 1_100.0;

        assert!(lander.fixed_update(&mut editor, &mut sim).is_empty());
        let session = lander.session(ship).unwrap();
        assert!((session.interim_altitude - 520.0).abs() < 1e-6, "{}", session.interim_altitude);
        assert_eq!(session.phase(), LandingPhase::Armed);
        let alt = sim.body(kerbin).unwrap().altitude(sim.vessel(ship).unwrap().position);
        assert!((alt - 520.0).abs() < 1e-2, "{alt}");

        sim.step(DT);
        lander.fixed_update(&mut editor, &mut sim);
        let session = lander.session(ship).unwrap();
        assert_eq!(session.phase(), LandingPhase::Settling);
        assert!(session.reached_landing_altitude());
    }

    #[test]
    fn edited_target_restarts_from_interim_altitude() {
        let (mut sim, kerbin, ship) = setup();
        sim.flatten_terrain(kerbin, 0.0);
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        lander.toggle(&sim, target(kerbin), None).unwrap();
        lander.session_mut(ship).unwrap().interim_altitude = 11.0;
        lander.fixed_update(&mut editor, &mut sim);
        let session = lander.session(ship).unwrap();
        assert_eq!(session.phase(), LandingPhase::Settling);
        let interim = session.interim_altitude;

        let session = lander.session_mut(ship).unwrap();
        session.edit_target(1.5, 2.5, 300.0);
        assert_eq!(session.phase(), LandingPhase::Armed);
        assert!(!session.reached_landing_altitude());
        assert_eq!(session.interim_altitude, interim);
        assert_eq!((session.target.lat, session.target.lon, session.target.alt), (1.5, 2.5, 300.0));
    }

    #[test]
    fn stops_even_when_body_is_gone() {
        let (sim, kerbin, ship) = setup();
        let mut lander = Lander::default();
        lander.toggle(&sim, target(kerbin), None).unwrap();
        let mut missing = target(kerbin);
        missing.body = BodyId::from_raw(99);
        assert_eq!(lander.toggle(&sim, missing, None), Ok(Toggle::Stopped));
        assert!(!lander.is_landing(ship));
        assert_eq!(
            lander.toggle(&sim, missing, None),
            Err(EditError::UnknownBody(missing.body))
        );
    }

    #[test]
    fn reductions_wait_for_interval() {
        let (mut sim, kerbin, ship) = setup();
        sim.flatten_terrain(kerbin, 0.0);
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        lander.toggle(&sim, target(kerbin), None).unwrap();
        lander.session_mut(ship).unwrap().interim_altitude = 110_000.0;

        lander.fixed_update(&mut editor, &mut sim);
        sim.step(0.2);
        lander.fixed_update(&mut editor, &mut sim);
        assert_eq!(lander.session(ship).unwrap().interim_altitude, 11_000.0);
        sim.step(0.3);
        lander.fixed_update(&mut editor, &mut sim);
        assert_eq!(lander.session(ship).unwrap().interim_altitude, 1_100.0);
    }

    #[test]
    fn lands_and_ends_session() {
        let (mut sim, kerbin, ship) = setup();
        sim.warp_rate = 100.0;
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        lander.toggle(&sim, target(kerbin), None).unwrap();
        assert_eq!(sim.warp_rate, 100.0);

        let mut outcome = None;
        for _ in 0..5000 {
            let finished = lander.fixed_update(&mut editor, &mut sim);
            assert_eq!(sim.warp_rate, 1.0);
            if let Some((id, o)) = finished.into_iter().next() {
                assert_eq!(id, ship);
                outcome = Some(o);
                break;
            }
            sim.step(DT);
        }
        assert_eq!(outcome, Some(LandingOutcome::Landed));
        let v = sim.vessel(ship).unwrap();
        assert!(v.grounded());
        assert!(!lander.is_landing(ship));
        let (lat, lon) = sim.body(kerbin).unwrap().lat_lon(sim.universal_time(), v.position);
        assert!((lat + 0.0972).abs() < 1e-3);
        assert!((normalize_angle(lon, 0.0) - 285.4423).abs() < 1e-3);
        // up axis along the local vertical
        let up = v.rotation * Vector3::z();
        assert!(up.dot(&v.position.normalize()) > 0.999);
        assert!(v.sas);
    }

    #[test]
    fn star_aborts_without_teleport() {
        let (mut sim, _, ship) = setup();
        let kerbol = sim.body_by_name("Kerbol").unwrap();
        let before = sim.vessel(ship).unwrap().clone();
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        lander.toggle(&sim, target(kerbol), None).unwrap();
        let finished = lander.fixed_update(&mut editor, &mut sim);
        assert_eq!(
            finished,
            vec![(ship, LandingOutcome::Aborted(EditError::MissingTerrainModel(kerbol)))]
        );
        assert_eq!(sim.vessel(ship).unwrap(), &before);
        assert!(lander.is_empty());
    }

    #[test]
    fn switching_vessels_ends_session() {
        let (mut sim, kerbin, ship) = setup();
        let orbit = simple_orbit(300_000.0, kerbin, sim.body(kerbin).unwrap(), UT::ZERO);
        let other = sim.add_vessel("Other", VesselType::Probe, orbit);
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        lander.toggle(&sim, target(kerbin), None).unwrap();
        sim.active = Some(other);
        assert_eq!(
            lander.fixed_update(&mut editor, &mut sim),
            vec![(ship, LandingOutcome::Deactivated)]
        );
    }

    #[test]
    fn nudges_move_target_and_notify() {
        let (mut sim, kerbin, ship) = setup();
        sim.flatten_terrain(kerbin, 0.0);
        let edits = Rc::new(RefCell::new(vec![]));
        let seen = Rc::clone(&edits);
        let callback: ManualEditCallback = Box::new(move |lat, lon, alt, body| {
            seen.borrow_mut().push((lat, lon, alt, body));
        });
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        lander.toggle(&sim, target(kerbin), Some(callback)).unwrap();
        lander.session_mut(ship).unwrap().interim_altitude = 10.0;
        lander.fixed_update(&mut editor, &mut sim);
        assert_eq!(lander.session(ship).unwrap().phase(), LandingPhase::Settling);

        lander.frame_update(&mut sim, NudgeInput::default());
        assert!(edits.borrow().is_empty());

        lander.frame_update(
            &mut sim,
            NudgeInput {
                north: true,
                ..NudgeInput::default()
            },
        );
        let session = lander.session(ship).unwrap();
        assert_eq!(session.phase(), LandingPhase::Armed);
        assert!(!session.reached_landing_altitude());
        assert_eq!(session.interim_altitude, 10.0);
        let moved = (session.target.lat + 0.0972).to_radians() * 600_000.0;
        assert!((moved - 20.0).abs() < 1e-6);
        assert_eq!(edits.borrow().len(), 1);
        assert_eq!(edits.borrow()[0].3, kerbin);

        lander.frame_update(
            &mut sim,
            NudgeInput {
                east: true,
                west: true,
                ..NudgeInput::default()
            },
        );
        let session = lander.session(ship).unwrap();
        assert!((session.target.lon - 285.4423).abs() < 1e-9);
        assert_eq!(edits.borrow().len(), 2);
    }

    #[test]
    fn land_here_settles_immediately() {
        let (mut sim, kerbin, ship) = setup();
        sim.flatten_terrain(kerbin, 0.0);
        let mut lander = Lander::default();
        let mut editor = OrbitEditor::new();
        assert_eq!(lander.land_here(&sim, None), Ok(true));
        assert_eq!(lander.land_here(&sim, None), Ok(false));
        let session = lander.session(ship).unwrap();
        assert!(!session.target.set_rotation);
        assert!((session.target.alt - 100_000.0).abs() < 1e-3);

        let rotation = sim.vessel(ship).unwrap().rotation;
        lander.fixed_update(&mut editor, &mut sim);
        assert_eq!(lander.session(ship).unwrap().phase(), LandingPhase::Settling);
        let v = sim.vessel(ship).unwrap();
        assert!((sim.body(kerbin).unwrap().altitude(v.position) - 100_000.0).abs() < 1e-2);
        // orientation carried along, nearly unchanged for an in-place move
        assert!(rotation.angle_to(&v.rotation) < 1e-6);
    }

    #[test]
    fn surface_craft_keep_heading() {
        let (sim, kerbin, ship) = setup();
        let mut vessel = sim.vessel(ship).unwrap().clone();
        vessel.kind = VesselType::Plane;
        vessel.rotation = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.3);
        let body = sim.body(kerbin).unwrap();
        let r = aligned_rotation(&vessel, body, UT::ZERO, 10.0, 20.0);
        let normal = body.fixed_to_inertial(UT::ZERO, Body::surface_normal(10.0, 20.0));
        assert!(((r * Vector3::y()) - normal).norm() < 1e-9);

        vessel.kind = VesselType::Ship;
        let r = aligned_rotation(&vessel, body, UT::ZERO, 10.0, 20.0);
        assert!(((r * Vector3::z()) - normal).norm() < 1e-9);

        let flip = rotation_between(&Vector3::z(), &-Vector3::z());
        assert!(((flip * Vector3::z()) + Vector3::z()).norm() < 1e-9);
    }

    #[test]
    fn target_from_landed_vessel() {
        let (mut sim, kerbin, ship) = setup();
        sim.flatten_terrain(kerbin, 0.0);
        let t = target_from_vessel(&sim, ship).unwrap();
        assert!((t.alt - 100_000.0).abs() < 1e-3);
        assert!((-180.0..180.0).contains(&t.lat));
        assert!(landed_vessels(&sim).is_empty());
        sim.vessel_mut(ship).unwrap().landed = true;
        assert_eq!(landed_vessels(&sim), vec![ship]);
    }

    #[test]
    fn field_parsing() {
        assert_eq!(parse_latitude("0"), Ok(0.001));
        assert_eq!(parse_latitude("-12.5"), Ok(-12.5));
        assert!(parse_latitude("89.95").is_err());
        assert!(parse_latitude("north").is_err());
        assert_eq!(parse_longitude("0"), Ok(0.001));
        assert_eq!(parse_longitude("400"), Ok(400.0));
        assert_eq!(parse_altitude("2k"), Ok(2000.0));
        assert_eq!(parse_altitude("0"), Ok(0.001));
        assert!(parse_altitude("-5").is_err());

        let mut fields = LandingFields::default();
        assert!(fields.parse().is_err());
        fields.load(1.0, 2.0, 3.0, BodyId::default());
        let t = fields.parse().unwrap();
        assert_eq!((t.lat, t.lon, t.alt), (1.0, 2.0, 3.0));
        assert!(t.set_rotation);
    }
}

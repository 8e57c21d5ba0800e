//! A small in-memory universe implementing [`Host`].
//!
//! Vessels move on Keplerian rails between ticks. A vessel that reaches
//! the terrain (or the sea, on bodies with oceans) is marked landed or
//! splashed and held at that spot while the body turns under it.
//! Terrain near the active vessel is "loaded" as a faceted mesh that the
//! ray cast hits; everything else only exists as the analytic model.

use std::{collections::BTreeMap, f64::consts};

use nalgebra::{UnitQuaternion, Vector3};
use time::Duration;
use tracing::{debug, trace};

use crate::{
    arena::Arena,
    bodies::{Body, BodyId},
    error::{EditError, EditResult},
    events::EventHub,
    host::{Host, OrbitTarget, SoiChange, Vessel, VesselId, VesselType},
    kepler::orbits::{Orbit, StateVector},
    terrain::{TerrainModel, TerrainTerm},
    time::UT,
};

const STATE_VECTOR_TOL: f64 = 1e-11;
/// Furthest a terrain ray is followed (`m`).
const RAY_RANGE: f64 = 5_000.0;
const RAY_MARCH_STEP: f64 = 25.0;
const RAY_BISECTIONS: u32 = 64;

#[derive(Debug)]
pub struct Simulation {
    pub bodies: Arena<BodyId, Body>,
    pub vessels: Arena<VesselId, Vessel>,
    pub active: Option<VesselId>,
    /// Time acceleration applied by [`Simulation::step`].
    pub warp_rate: f64,
    /// Spacing of the terrain mesh grid (degrees).
    pub mesh_resolution: f64,
    /// Terrain within this distance of the active vessel is loaded (`m`).
    pub load_radius: f64,
    /// A vessel this close to the ground is considered touching it (`m`).
    pub contact_height: f64,
    pub soi_changes: EventHub<SoiChange>,
    time: UT,
    home: Option<BodyId>,
    physics_holds: u32,
    /// Body-fixed `(lat, lon, alt)` of grounded vessels.
    anchors: BTreeMap<VesselId, (f64, f64, f64)>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            bodies: Arena::new(),
            vessels: Arena::new(),
            active: None,
            warp_rate: 1.0,
            mesh_resolution: 0.01,
            load_radius: 25_000.0,
            contact_height: 0.5,
            soi_changes: EventHub::new(),
            time: UT::ZERO,
            home: None,
            physics_holds: 0,
            anchors: BTreeMap::new(),
        }
    }
}

struct Planet {
    name: &'static str,
    mu: f64,
    radius: f64,
    atmosphere_depth: f64,
    rotperiod: f64,
    rotini: f64,
    soi: f64,
    terrain: Option<TerrainModel>,
}

fn circular(body: BodyId, sma: f64, inclination: f64, lan: f64, argpe: f64, mean_anomaly: f64) -> Orbit {
    Orbit {
        inclination,
        eccentricity: 0.0,
        semi_major_axis: sma,
        lan,
        argument_of_periapsis: argpe,
        mean_anomaly_at_epoch: mean_anomaly,
        epoch: UT::ZERO,
        body,
    }
}

fn term(amplitude: f64, lat_frequency: f64, lon_frequency: f64, phase: f64) -> TerrainTerm {
    TerrainTerm {
        amplitude,
        lat_frequency,
        lon_frequency,
        phase,
    }
}

impl Simulation {
    /// The stock star system: Kerbol with Kerbin, and the Mun and Minmus
    /// around Kerbin. Kerbin is home.
    pub fn kerbol() -> Self {
        let mut sim = Self::default();
        let kerbol = sim.add_body(
            Planet {
                name: "Kerbol",
                mu: 1.172_332_8e18,
                radius: 261_600_000.0,
                atmosphere_depth: 600_000.0,
                rotperiod: 432_000.0,
                rotini: 0.0,
                soi: f64::INFINITY,
                terrain: None,
            },
            None,
        );
        let kerbin = sim.add_body(
            Planet {
                name: "Kerbin",
                mu: 3.5316e12,
                radius: 600_000.0,
                atmosphere_depth: 70_000.0,
                rotperiod: 21_549.425,
                rotini: consts::FRAC_PI_2,
                soi: 84_159_286.0,
                terrain: Some(TerrainModel {
                    offset: 816.36,
                    terms: vec![
                        term(1400.0, 3.0, 2.0, 0.4),
                        term(700.0, 7.0, 5.0, 1.1),
                        term(180.0, 17.0, 13.0, 2.3),
                    ],
                    ocean: true,
                }),
            },
            Some(circular(kerbol, 13_599_840_256.0, 0.0, 0.0, 0.0, 3.14)),
        );
        sim.add_body(
            Planet {
                name: "Mun",
                mu: 6.513_839_8e10,
                radius: 200_000.0,
                atmosphere_depth: 0.0,
                rotperiod: 138_984.38,
                rotini: 4.0,
                soi: 2_429_559.1,
                terrain: Some(TerrainModel {
                    offset: 1500.0,
                    terms: vec![term(2500.0, 4.0, 3.0, 0.0), term(900.0, 11.0, 9.0, 0.7)],
                    ocean: false,
                }),
            },
            Some(circular(kerbin, 12_000_000.0, 0.0, 0.0, 0.0, 1.7)),
        );
        sim.add_body(
            Planet {
                name: "Minmus",
                mu: 1.765_8e9,
                radius: 60_000.0,
                atmosphere_depth: 0.0,
                rotperiod: 40_400.0,
                rotini: 4.0,
                soi: 2_247_428.4,
                terrain: Some(TerrainModel {
                    offset: 400.0,
                    terms: vec![term(600.0, 2.0, 3.0, 1.9)],
                    ocean: false,
                }),
            },
            Some(circular(kerbin, 47_000_000.0, 6.0, 78.0, 38.0, 0.9)),
        );
        sim.home = Some(kerbin);
        sim
    }

    fn add_body(&mut self, planet: Planet, ephem: Option<Orbit>) -> BodyId {
        let parent = ephem.map(|o| o.body);
        let hill_sphere = match (ephem, parent.and_then(|p| self.bodies.get(p))) {
            (Some(o), Some(p)) => {
                o.semi_major_axis * (1.0 - o.eccentricity) * libm::pow(planet.mu / p.mu, 1.0 / 3.0)
            }
            _ => f64::INFINITY,
        };
        let id = self.bodies.push(Body {
            mu: planet.mu,
            radius: planet.radius,
            atmosphere_depth: planet.atmosphere_depth,
            ephem,
            rotperiod: planet.rotperiod,
            rotini: planet.rotini,
            satellites: vec![],
            parent,
            name: planet.name.into(),
            is_star: parent.is_none(),
            soi: planet.soi,
            hill_sphere,
            terrain: planet.terrain,
        });
        if let Some(parent) = parent.and_then(|p| self.bodies.get_mut(p)) {
            parent.satellites.push(id);
        }
        id
    }

    /// Put a new vessel on `orbit` at the current time.
    pub fn add_vessel(&mut self, name: impl Into<String>, kind: VesselType, orbit: Orbit) -> VesselId {
        let (position, velocity) = self
            .bodies
            .get(orbit.body)
            .map(|b| {
                let state = orbit.state_at(self.time, b.mu);
                (state.position, state.velocity)
            })
            .unwrap_or((Vector3::zeros(), Vector3::zeros()));
        self.vessels.push(Vessel {
            name: name.into(),
            orbit,
            kind,
            landed: false,
            splashed: false,
            landed_at: String::new(),
            rotation: UnitQuaternion::identity(),
            sas: false,
            launch_clamps: 0,
            position,
            velocity,
        })
    }

    pub fn physics_suspended(&self) -> bool {
        self.physics_holds > 0
    }

    /// Replace the terrain of `body` with a smooth surface at `height`.
    pub fn flatten_terrain(&mut self, body: BodyId, height: f64) {
        if let Some(terrain) = self.bodies.get_mut(body).and_then(|b| b.terrain.as_mut()) {
            terrain.offset = height;
            terrain.terms.clear();
        }
    }

    /// Height of the loaded terrain mesh: the analytic model sampled on a
    /// grid and interpolated bilinearly between samples.
    pub fn mesh_height(&self, body: BodyId, lat: f64, lon: f64) -> Option<f64> {
        let terrain = self.bodies.get(body)?.terrain.as_ref()?;
        let res = self.mesh_resolution;
        let (i, j) = ((lat / res).floor(), (lon / res).floor());
        let (u, v) = (lat / res - i, lon / res - j);
        let sample = |di: f64, dj: f64| terrain.height((i + di) * res, (j + dj) * res);
        let south = sample(0.0, 0.0) * (1.0 - v) + sample(0.0, 1.0) * v;
        let north = sample(1.0, 0.0) * (1.0 - v) + sample(1.0, 1.0) * v;
        Some(south * (1.0 - u) + north * u)
    }

    /// Is the mesh loaded around the body-fixed point `fixed`?
    pub fn mesh_loaded(&self, body: BodyId, fixed: Vector3<f64>) -> bool {
        let distance = self
            .active
            .and_then(|id| self.vessels.get(id))
            .filter(|v| v.body() == body)
            .zip(self.bodies.get(body))
            .map_or(f64::INFINITY, |(v, b)| {
                (b.inertial_to_fixed(self.time, v.position) - fixed).norm()
            });
        distance <= self.load_radius
    }

    /// Height of whatever surface a vessel would collide with, and
    /// whether that surface is water.
    fn ground(&self, id: BodyId, lat: f64, lon: f64) -> Option<(f64, bool)> {
        let body = self.bodies.get(id)?;
        let terrain = body.terrain.as_ref()?;
        let fixed = body.fixed_surface_position(lat, lon, 0.0);
        let height = if self.mesh_loaded(id, fixed) {
            self.mesh_height(id, lat, lon)?
        } else {
            terrain.height(lat, lon)
        };
        if terrain.ocean && height < 0.0 {
            Some((0.0, true))
        } else {
            Some((height, false))
        }
    }

    /// Advance the universe by `dt` seconds of real time.
    pub fn step(&mut self, dt: f64) {
        self.time += Duration::seconds_f64(dt * self.warp_rate);
        let ids: Vec<VesselId> = self.vessels.ids().collect();
        for id in ids {
            self.advance_vessel(id);
        }
    }

    fn advance_vessel(&mut self, id: VesselId) {
        let now = self.time;
        let Some(vessel) = self.vessels.get(id) else {
            return;
        };
        let body_id = vessel.body();
        let Some(body) = self.bodies.get(body_id) else {
            return;
        };

        if !vessel.grounded() {
            self.anchors.remove(&id);
        }
        let anchor = self.anchors.get(&id).copied().or_else(|| {
            let state = vessel.orbit.state_at(now, body.mu);
            let (lat, lon) = body.lat_lon(now, state.position);
            let (ground, water) = self.ground(body_id, lat, lon)?;
            if body.altitude(state.position) > ground + self.contact_height {
                return None;
            }
            debug!(?id, lat, lon, ground, water, "vessel touched down");
            Some((lat, lon, ground))
        });

        let (position, velocity, orbit) = match anchor {
            Some((lat, lon, alt)) => {
                let position = body.surface_position(now, lat, lon, alt);
                let velocity = body.surface_velocity(position);
                let orbit = StateVector {
                    body: body_id,
                    position,
                    velocity,
                    time: now,
                }
                .into_orbit(body.mu, STATE_VECTOR_TOL);
                (position, velocity, orbit)
            }
            None => {
                let state = vessel.orbit.state_at(now, body.mu);
                (state.position, state.velocity, vessel.orbit)
            }
        };
        let newly_grounded = anchor.is_some() && !self.anchors.contains_key(&id);
        let water = anchor.is_some_and(|(lat, lon, _)| {
            self.ground(body_id, lat, lon).is_some_and(|(_, water)| water)
        });

        let vessel = &mut self.vessels[id];
        vessel.position = position;
        vessel.velocity = velocity;
        vessel.orbit = orbit;
        if let (true, Some(anchor)) = (newly_grounded, anchor) {
            vessel.landed = !water;
            vessel.splashed = water;
            self.anchors.insert(id, anchor);
        }
    }
}

/// Latitude and longitude (degrees) of a body-fixed point.
fn fixed_lat_lon(p: &Vector3<f64>) -> (f64, f64) {
    let r = p.norm();
    if r == 0.0 {
        return (0.0, 0.0);
    }
    (
        libm::asin((p.z / r).clamp(-1.0, 1.0)).to_degrees(),
        libm::atan2(p.y, p.x).to_degrees(),
    )
}

impl Host for Simulation {
    fn universal_time(&self) -> UT {
        self.time
    }

    fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id)
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id)
    }

    fn body_ids(&self) -> Vec<BodyId> {
        self.bodies.ids().collect()
    }

    fn home_body(&self) -> Option<BodyId> {
        self.home
    }

    fn vessel(&self, id: VesselId) -> Option<&Vessel> {
        self.vessels.get(id)
    }

    fn vessel_mut(&mut self, id: VesselId) -> Option<&mut Vessel> {
        self.vessels.get_mut(id)
    }

    fn vessel_ids(&self) -> Vec<VesselId> {
        self.vessels.ids().collect()
    }

    fn active_vessel(&self) -> Option<VesselId> {
        self.active
    }

    fn release_launch_clamps(&mut self, vessel: VesselId) {
        if let Some(v) = self.vessels.get_mut(vessel) {
            if v.launch_clamps > 0 {
                debug!(?vessel, clamps = v.launch_clamps, "releasing launch clamps");
            }
            v.launch_clamps = 0;
        }
    }

    fn suspend_physics(&mut self) {
        self.physics_holds += 1;
    }

    fn resume_physics(&mut self) {
        self.physics_holds = self.physics_holds.saturating_sub(1);
    }

    fn hardset_orbit(&mut self, target: OrbitTarget, orbit: Orbit) -> EditResult {
        match target {
            OrbitTarget::Vessel(id) => {
                let mu = self
                    .bodies
                    .get(orbit.body)
                    .ok_or(EditError::UnknownBody(orbit.body))?
                    .mu;
                let vessel = self.vessels.get_mut(id).ok_or(EditError::UnknownVessel(id))?;
                let state = orbit.state_at(self.time, mu);
                vessel.orbit = orbit;
                vessel.position = state.position;
                vessel.velocity = state.velocity;
                self.anchors.remove(&id);
            }
            OrbitTarget::Body(id) => {
                self.bodies
                    .get_mut(id)
                    .ok_or(EditError::UnknownBody(id))?
                    .ephem = Some(orbit);
            }
        }
        Ok(())
    }

    fn reparent_body(&mut self, body: BodyId, from: Option<BodyId>, to: BodyId) -> EditResult {
        if !self.bodies.contains(to) {
            return Err(EditError::UnknownBody(to));
        }
        if let Some(old) = from.and_then(|f| self.bodies.get_mut(f)) {
            old.satellites.retain(|&s| s != body);
        }
        self.bodies
            .get_mut(body)
            .ok_or(EditError::UnknownBody(body))?
            .parent = Some(to);
        self.bodies[to].satellites.push(body);
        Ok(())
    }

    fn fire_soi_change(&mut self, change: SoiChange) {
        self.soi_changes.emit(&change);
    }

    fn cancel_time_warp(&mut self) {
        self.warp_rate = 1.0;
    }

    fn raycast_terrain(
        &self,
        body: BodyId,
        origin: Vector3<f64>,
        direction: Vector3<f64>,
    ) -> Option<f64> {
        let radius = self.bodies.get(body)?.radius;
        let direction = direction.try_normalize(f64::EPSILON)?;
        if !self.mesh_loaded(body, origin) {
            return None;
        }
        let clearance = |t: f64| -> Option<f64> {
            let p = origin + direction * t;
            let (lat, lon) = fixed_lat_lon(&p);
            Some(p.norm() - radius - self.mesh_height(body, lat, lon)?)
        };

        if clearance(0.0)? <= 0.0 {
            return Some(0.0);
        }
        let (mut above, mut below) = (0.0, None);
        let mut t = RAY_MARCH_STEP;
        while t <= RAY_RANGE {
            if clearance(t)? <= 0.0 {
                below = Some(t);
                break;
            }
            above = t;
            t += RAY_MARCH_STEP;
        }
        let mut below = below?;
        for _ in 0..RAY_BISECTIONS {
            let mid = (above + below) / 2.0;
            if clearance(mid)? > 0.0 {
                above = mid;
            } else {
                below = mid;
            }
        }
        trace!(?body, distance = below, "terrain ray hit");
        Some(below)
    }

    fn change_world_velocity(&mut self, vessel: VesselId, delta: Vector3<f64>) {
        let Some(v) = self.vessels.get_mut(vessel) else {
            return;
        };
        let Some(body) = self.bodies.get(v.body()) else {
            return;
        };
        v.velocity += delta;
        v.orbit = StateVector {
            body: v.body(),
            position: v.position,
            velocity: v.velocity,
            time: self.time,
        }
        .into_orbit(body.mu, STATE_VECTOR_TOL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::simple_orbit;

    #[test]
    fn stock_system() {
        let sim = Simulation::kerbol();
        let kerbol = sim.body_by_name("Kerbol").unwrap();
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        let mun = sim.body_by_name("Mun").unwrap();
        assert_eq!(sim.home_body(), Some(kerbin));
        assert!(sim.body(kerbol).unwrap().is_star);
        assert_eq!(sim.body(kerbin).unwrap().satellites.len(), 2);
        assert_eq!(sim.body(mun).unwrap().parent, Some(kerbin));
        let ksc = sim.body(kerbin).unwrap().terrain.as_ref().unwrap().height(-0.0972, 285.4423);
        assert!(ksc > 0.0 && ksc < 200.0, "{ksc}");
    }

    #[test]
    fn vessels_follow_their_orbit() {
        let mut sim = Simulation::kerbol();
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        let orbit = simple_orbit(100_000.0, kerbin, sim.body(kerbin).unwrap(), UT::ZERO);
        let ship = sim.add_vessel("Ship", VesselType::Ship, orbit);
        for _ in 0..50 {
            sim.step(0.1);
        }
        let v = sim.vessel(ship).unwrap();
        let expected = orbit.position_at(UT::new_seconds(5.0), sim.body(kerbin).unwrap().mu);
        assert!((v.position - expected).norm() < 1e-3);
        assert!(!v.grounded());
    }

    #[test]
    fn dropped_vessel_lands_and_turns_with_body() {
        let mut sim = Simulation::kerbol();
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        sim.flatten_terrain(kerbin, 100.0);
        let body = sim.body(kerbin).unwrap();
        let position = body.surface_position(UT::ZERO, 10.0, 20.0, 110.0);
        let orbit = StateVector {
            body: kerbin,
            position,
            velocity: body.surface_velocity(position),
            time: UT::ZERO,
        }
        .into_orbit(body.mu, STATE_VECTOR_TOL);
        let ship = sim.add_vessel("Ship", VesselType::Lander, orbit);
        sim.active = Some(ship);

        let mut steps = 0;
        while !sim.vessel(ship).unwrap().grounded() {
            sim.step(0.02);
            steps += 1;
            assert!(steps < 1000);
        }
        let v = sim.vessel(ship).unwrap();
        assert!(v.landed && !v.splashed);

        for _ in 0..100 {
            sim.step(1.0);
        }
        let body = sim.body(kerbin).unwrap();
        let v = sim.vessel(ship).unwrap();
        let (lat, lon) = body.lat_lon(sim.universal_time(), v.position);
        assert!((lat - 10.0).abs() < 1e-2 && (lon - 20.0).abs() < 1e-2);
        assert!((body.altitude(v.position) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn sea_is_splashed() {
        let mut sim = Simulation::kerbol();
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        sim.flatten_terrain(kerbin, -50.0);
        let body = sim.body(kerbin).unwrap();
        let position = body.surface_position(UT::ZERO, 0.0, 0.0, 0.2);
        let orbit = StateVector {
            body: kerbin,
            position,
            velocity: body.surface_velocity(position),
            time: UT::ZERO,
        }
        .into_orbit(body.mu, STATE_VECTOR_TOL);
        let ship = sim.add_vessel("Boat", VesselType::Ship, orbit);
        sim.step(0.02);
        let v = sim.vessel(ship).unwrap();
        assert!(v.splashed && !v.landed);
    }

    #[test]
    fn radial_ray_hits_mesh() {
        let mut sim = Simulation::kerbol();
        sim.load_radius = f64::INFINITY;
        let mun = sim.body_by_name("Mun").unwrap();
        let body = sim.body(mun).unwrap();
        let h = sim.mesh_height(mun, 5.0, 6.0).unwrap();
        let origin = body.fixed_surface_position(5.0, 6.0, h + 1000.0);
        let hit = sim.raycast_terrain(mun, origin, -origin).unwrap();
        assert!((hit - 1000.0).abs() < 1e-6);
        assert_eq!(sim.raycast_terrain(mun, origin, origin), None);

        sim.load_radius = 0.0;
        assert_eq!(sim.raycast_terrain(mun, origin, -origin), None);
    }

    #[test]
    fn physics_holds_nest() {
        let mut sim = Simulation::kerbol();
        sim.suspend_physics();
        sim.suspend_physics();
        sim.resume_physics();
        assert!(sim.physics_suspended());
        sim.resume_physics();
        sim.resume_physics();
        assert!(!sim.physics_suspended());
    }
}

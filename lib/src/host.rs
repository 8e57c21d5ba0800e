//! The surface of the live simulation that the editor and lander drive.
//!
//! Everything here is plain data plus one trait. The game (or the
//! in-memory [`crate::sim::Simulation`]) implements [`Host`]; the rest of
//! the crate never reaches into host internals directly.

use nalgebra::{UnitQuaternion, Vector3};
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};

use crate::{
    bodies::{Body, BodyId},
    error::EditResult,
    id_type,
    kepler::orbits::Orbit,
    time::UT,
};

id_type!(
    /// Identity of a simulated vehicle.
    VesselId
);

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, FromPrimitive, IntoPrimitive,
)]
#[repr(i32)]
pub enum VesselType {
    Debris = 0,
    SpaceObject = 1,
    #[default]
    Unknown = 2,
    Probe = 3,
    Relay = 4,
    Rover = 5,
    Lander = 6,
    Ship = 7,
    Plane = 8,
    Station = 9,
    Base = 10,
    Eva = 11,
    Flag = 12,
}

impl VesselType {
    /// Vehicles that rest on wheels or a fixed base and keep their
    /// heading when placed on the ground.
    pub fn is_surface_craft(self) -> bool {
        matches!(self, VesselType::Plane | VesselType::Rover | VesselType::Base)
    }
}

/// Plain-data view of a simulated vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub name: String,
    pub orbit: Orbit,
    pub kind: VesselType,
    pub landed: bool,
    pub splashed: bool,
    /// Name of the surface feature the vessel is attached to, empty if
    /// none (e.g. `"Runway"`).
    pub landed_at: String,
    /// Attitude relative to the reference body's inertial frame. The
    /// vessel's "up" is local `z`, its "forward" is local `y`.
    pub rotation: UnitQuaternion<f64>,
    pub sas: bool,
    /// Number of launch clamps still holding the vessel down.
    pub launch_clamps: u32,
    /// Body-relative inertial position, re-derived from `orbit` by the host.
    pub position: Vector3<f64>,
    /// Body-relative inertial velocity, re-derived from `orbit` by the host.
    pub velocity: Vector3<f64>,
}

impl Vessel {
    pub fn body(&self) -> BodyId {
        self.orbit.body
    }

    /// Is this vessel resting on terrain or water?
    pub fn grounded(&self) -> bool {
        self.landed || self.splashed
    }
}

/// The object whose orbit an edit applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitTarget {
    Vessel(VesselId),
    Body(BodyId),
}

/// A vessel moved from one reference body to another.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SoiChange {
    pub vessel: VesselId,
    pub from: BodyId,
    pub to: BodyId,
}

/// Primitives the live simulation exposes to the editor.
pub trait Host {
    fn universal_time(&self) -> UT;

    fn body(&self, id: BodyId) -> Option<&Body>;
    fn body_mut(&mut self, id: BodyId) -> Option<&mut Body>;
    fn body_ids(&self) -> Vec<BodyId>;
    /// The body the game starts on.
    fn home_body(&self) -> Option<BodyId>;

    fn body_by_name(&self, name: &str) -> Option<BodyId> {
        self.body_ids()
            .into_iter()
            .find(|&id| self.body(id).is_some_and(|b| b.name == name))
    }

    fn vessel(&self, id: VesselId) -> Option<&Vessel>;
    fn vessel_mut(&mut self, id: VesselId) -> Option<&mut Vessel>;
    fn vessel_ids(&self) -> Vec<VesselId>;
    /// The vessel under the operator's control, if any.
    fn active_vessel(&self) -> Option<VesselId>;

    /// Detach every launch clamp holding `vessel`.
    fn release_launch_clamps(&mut self, vessel: VesselId);

    /// Put every vessel on rails. Calls nest; each must be matched by
    /// [`Host::resume_physics`].
    fn suspend_physics(&mut self);
    fn resume_physics(&mut self);

    /// Write the elements into the live orbit of `target` and re-derive
    /// its cached position and velocity. Does no validation.
    fn hardset_orbit(&mut self, target: OrbitTarget, orbit: Orbit) -> EditResult;

    /// Move `body` from the satellites of `from` to the satellites of
    /// `to` as one step.
    fn reparent_body(&mut self, body: BodyId, from: Option<BodyId>, to: BodyId) -> EditResult;

    fn fire_soi_change(&mut self, change: SoiChange);

    /// Drop back to 1x time acceleration.
    fn cancel_time_warp(&mut self);

    /// Cast a ray against the loaded terrain of `body`. `origin` and
    /// `direction` are in the body-fixed frame; returns the distance to
    /// the first hit.
    fn raycast_terrain(&self, body: BodyId, origin: Vector3<f64>, direction: Vector3<f64>)
        -> Option<f64>;

    /// Add `delta` to the velocity of every part of `vessel`.
    fn change_world_velocity(&mut self, vessel: VesselId, delta: Vector3<f64>);
}

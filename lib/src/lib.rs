#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::doc_markdown
)]
pub mod arena;
pub mod bodies;
pub mod coords;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod events;
pub mod geodesy;
pub mod host;
pub mod kepler;
pub mod lander;
pub mod sim;
pub mod terrain;
pub mod time;

use color_eyre::eyre;
use tracing::info;

use crate::{
    coords::CoordinateStore,
    editor::OrbitEditor,
    host::{Host, VesselId},
    lander::{Lander, LandingOutcome, LandingTarget, LandingTuning, ManualEditCallback, NudgeInput, Toggle},
};

/// Game scenes the editor may be opened in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Scene {
    MainMenu,
    SpaceCenter,
    Editor,
    Flight,
    TrackingStation,
}

/// One editor instance: the orbit editor plus every landing session.
/// The host drives it from its two ticks and its scene changes.
#[derive(Debug, Default)]
pub struct HyperEdit {
    pub editor: OrbitEditor,
    pub lander: Lander,
    /// Open the lander window automatically when entering flight or the
    /// tracking station.
    pub auto_open_lander: bool,
}

impl HyperEdit {
    pub fn new(tuning: LandingTuning, auto_open_lander: bool) -> Self {
        Self {
            editor: OrbitEditor::new(),
            lander: Lander::new(tuning),
            auto_open_lander,
        }
    }

    /// Physics tick.
    pub fn fixed_update(&mut self, host: &mut impl Host) -> Vec<(VesselId, LandingOutcome)> {
        let finished = self.lander.fixed_update(&mut self.editor, host);
        self.editor.tick();
        finished
    }

    /// Frame tick.
    pub fn frame_update(&mut self, host: &mut impl Host, input: NudgeInput) {
        self.lander.frame_update(host, input);
    }

    /// Start or stop landing the active vessel. A started landing is
    /// remembered as the most recent coordinates in `store`.
    pub fn toggle_landing(
        &mut self,
        host: &impl Host,
        store: &mut impl CoordinateStore,
        target: LandingTarget,
        on_manual_edit: Option<ManualEditCallback>,
    ) -> eyre::Result<Toggle> {
        let toggle = self.lander.toggle(host, target, on_manual_edit)?;
        if toggle == Toggle::Started {
            let started = host
                .active_vessel()
                .and_then(|id| self.lander.session(id))
                .map_or(target, |s| s.target);
            coords::save_recent(store, host, started.body, started.lat, started.lon, started.alt)?;
        }
        Ok(toggle)
    }

    /// Tear down every session. Returns whether the lander window should
    /// be opened in the new scene.
    pub fn on_scene_change(&mut self, scene: Scene) -> bool {
        info!(?scene, "scene changed");
        self.lander.clear();
        self.auto_open_lander && matches!(scene, Scene::Flight | Scene::TrackingStation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        coords::{MemoryStore, RECENT_ENTRY},
        editor::simple_orbit,
        host::VesselType,
        sim::Simulation,
        time::UT,
    };

    fn setup() -> (Simulation, HyperEdit, LandingTarget) {
        let mut sim = Simulation::kerbol();
        let kerbin = sim.body_by_name("Kerbin").unwrap();
        let orbit = simple_orbit(100_000.0, kerbin, sim.body(kerbin).unwrap(), UT::ZERO);
        let ship = sim.add_vessel("Ship", VesselType::Ship, orbit);
        sim.active = Some(ship);
        let target = LandingTarget {
            lat: 0.0,
            lon: 12.0,
            alt: 30.0,
            body: kerbin,
            set_rotation: true,
        };
        (sim, HyperEdit::new(LandingTuning::default(), true), target)
    }

    #[test]
    fn started_landing_is_recorded() {
        let (sim, mut he, target) = setup();
        let mut store = MemoryStore::default();
        assert_eq!(
            he.toggle_landing(&sim, &mut store, target, None).unwrap(),
            Toggle::Started
        );
        let recent = store.0.iter().find(|c| c.name == RECENT_ENTRY).unwrap();
        assert_eq!((recent.lat, recent.lon, recent.alt), (0.001, 12.0, 30.0));
        assert_eq!(recent.body, "Kerbin");

        store.0.clear();
        assert_eq!(
            he.toggle_landing(&sim, &mut store, target, None).unwrap(),
            Toggle::Stopped
        );
        assert!(store.0.is_empty());
    }

    #[test]
    fn scene_change_drops_sessions() {
        let (sim, mut he, target) = setup();
        let mut store = MemoryStore::default();
        he.toggle_landing(&sim, &mut store, target, None).unwrap();
        assert_eq!(he.lander.len(), 1);
        assert!(!he.on_scene_change(Scene::SpaceCenter));
        assert!(he.lander.is_empty());
        assert!(he.on_scene_change(Scene::Flight));
        he.auto_open_lander = false;
        assert!(!he.on_scene_change(Scene::TrackingStation));
    }

    #[test]
    fn ticks_drive_sessions() {
        let (mut sim, mut he, target) = setup();
        let mut store = MemoryStore::default();
        he.toggle_landing(&sim, &mut store, target, None).unwrap();
        assert!(he.fixed_update(&mut sim).is_empty());
        let ship = sim.active.unwrap();
        let v = sim.vessel(ship).unwrap();
        let kerbin = target.body;
        let alt = sim.body(kerbin).unwrap().altitude(v.position);
        assert!((alt - 68_000.0).abs() < 1.0, "{alt}");
        he.frame_update(&mut sim, NudgeInput::default());
    }
}

use std::{cell::RefCell, io::Write, rc::Rc};

use color_eyre::eyre::{self, eyre, OptionExt};
use hyperedit::{
    bodies::BodyId,
    coords::{self, LandingCoordinates},
    editor::{editable_targets, simple_orbit, target_name, EditorFields, GraphicalElements},
    geodesy::normalize_angle,
    host::{Host, OrbitTarget, VesselId, VesselType},
    lander::{
        landed_vessels, target_from_vessel, LandingFields, LandingOutcome, LandingPhase,
        ManualEditCallback, NudgeInput, Toggle,
    },
    sim::Simulation,
    HyperEdit, Scene,
};
use tracing::{debug, info};

use crate::{command::Command, config::Config, i18n, i18n_args, store::RonStore};

type PendingEdit = Rc<RefCell<Option<(f64, f64, f64, BodyId)>>>;

/// A headless editor session against the in-memory simulation.
pub struct Console {
    sim: Simulation,
    hyperedit: HyperEdit,
    fields: EditorFields,
    landing: LandingFields,
    store: RonStore,
    physics_dt: f64,
    /// Latest target change made by a landing session itself.
    pending_edit: PendingEdit,
}

impl Console {
    /// Start with the stock system and one vessel in a low orbit around
    /// the home body.
    pub fn new(config: &Config, store: RonStore) -> eyre::Result<Self> {
        let mut sim = Simulation::kerbol();
        let home = sim.home_body().ok_or_eyre("simulation has no home body")?;
        let body = sim.body(home).ok_or_eyre("home body is missing")?;
        let orbit = simple_orbit(100_000.0, home, body, sim.universal_time());
        let ship = sim.add_vessel("Untitled Space Craft", VesselType::Ship, orbit);
        sim.active = Some(ship);

        let mut fields = EditorFields::default();
        fields.select(&sim, OrbitTarget::Vessel(ship))?;
        let landing = LandingFields {
            body: Some(home),
            ..LandingFields::default()
        };
        info!(?ship, "console session ready");
        Ok(Self {
            sim,
            hyperedit: HyperEdit::new(config.landing, config.auto_open_lander),
            fields,
            landing,
            store,
            physics_dt: config.physics_dt,
            pending_edit: Rc::default(),
        })
    }

    fn body(&self, name: &str) -> eyre::Result<BodyId> {
        self.sim
            .body_by_name(name)
            .ok_or_else(|| eyre!(i18n_args!("error-unknown-body", "name", name)))
    }

    fn active(&self) -> eyre::Result<VesselId> {
        self.sim.active.ok_or_else(|| eyre!(i18n!("error-no-vessel")))
    }

    fn target(&self, index: usize) -> eyre::Result<OrbitTarget> {
        editable_targets(&self.sim)
            .get(index)
            .copied()
            .ok_or_else(|| eyre!(i18n_args!("error-bad-index", "index", index)))
    }

    fn ensure_selected(&mut self) -> eyre::Result<()> {
        if self.fields.target.is_none() {
            let active = self.active()?;
            self.fields.select(&self.sim, OrbitTarget::Vessel(active))?;
        }
        Ok(())
    }

    fn manual_edit_callback(&self) -> ManualEditCallback {
        let pending = Rc::clone(&self.pending_edit);
        Box::new(move |lat, lon, alt, body| {
            *pending.borrow_mut() = Some((lat, lon, alt, body));
        })
    }

    /// Copy target changes made by a session into the landing fields.
    fn sync_landing_fields(&mut self) {
        if let Some((lat, lon, alt, body)) = self.pending_edit.borrow_mut().take() {
            debug!(lat, lon, alt, "landing target moved");
            self.landing.load(lat, lon, alt, body);
        }
    }

    fn orbit_applied(&self, out: &mut impl Write) -> eyre::Result<()> {
        let target = self.fields.target.ok_or_eyre("nothing selected")?;
        writeln!(
            out,
            "{}",
            i18n_args!(
                "orbit-applied",
                "target",
                target_name(&self.sim, target),
                "altitude",
                self.fields.simple_altitude.clone()
            )
        )?;
        Ok(())
    }

    /// Run one command. Returns `false` once the session should end.
    pub fn execute(&mut self, command: Command, out: &mut impl Write) -> eyre::Result<bool> {
        match command {
            Command::Help => writeln!(out, "{}", i18n!("help"))?,
            Command::Status => self.status(out)?,
            Command::Targets => {
                for (i, target) in editable_targets(&self.sim).into_iter().enumerate() {
                    let marker = if self.fields.target == Some(target) { "*" } else { " " };
                    writeln!(out, "{marker} {i:>2}  {}", target_name(&self.sim, target))?;
                }
            }
            Command::Select(index) => {
                let target = self.target(index)?;
                self.fields.select(&self.sim, target)?;
                writeln!(
                    out,
                    "{}",
                    i18n_args!("selected", "target", target_name(&self.sim, target))
                )?;
            }
            Command::Simple { body, altitude } => {
                self.ensure_selected()?;
                self.fields.reference = Some(self.body(&body)?);
                self.fields.simple_altitude = altitude;
                self.fields
                    .apply_simple(&mut self.hyperedit.editor, &mut self.sim)?;
                self.orbit_applied(out)?;
            }
            Command::Complex { body, elements } => {
                self.ensure_selected()?;
                self.fields.reference = Some(self.body(&body)?);
                let [inc, ecc, sma, lan, argpe, mep, epoch]: [String; 7] = elements
                    .try_into()
                    .map_err(|_| eyre!("expected seven orbital elements"))?;
                let c = &mut self.fields.complex;
                c.inclination = inc;
                c.eccentricity = ecc;
                c.semi_major_axis = sma;
                c.lan = lan;
                c.argument_of_periapsis = argpe;
                c.mean_anomaly_at_epoch = mep;
                c.epoch = epoch;
                self.fields
                    .apply_complex(&mut self.hyperedit.editor, &mut self.sim)?;
                self.orbit_applied(out)?;
            }
            Command::Graphical(values) => {
                self.ensure_selected()?;
                let [inclination, eccentricity, periapsis, lan, argument_of_periapsis, mean_anomaly, epoch] =
                    values[..]
                else {
                    eyre::bail!("expected six slider values and an epoch");
                };
                self.fields.graphical = GraphicalElements {
                    inclination,
                    eccentricity,
                    periapsis,
                    lan,
                    argument_of_periapsis,
                    mean_anomaly,
                };
                self.fields.graphical_epoch = epoch;
                self.fields
                    .apply_graphical(&mut self.hyperedit.editor, &mut self.sim)?;
                self.orbit_applied(out)?;
            }
            Command::Velocity { direction, speed } => {
                self.ensure_selected()?;
                self.fields.velocity_direction = direction.parse()?;
                self.fields.velocity_speed = speed;
                self.fields
                    .apply_velocity(&mut self.hyperedit.editor, &mut self.sim)?;
                self.fields.refresh(&self.sim)?;
                self.orbit_applied(out)?;
            }
            Command::Rendezvous { with, lead_time } => {
                self.ensure_selected()?;
                let OrbitTarget::Vessel(with) = self.target(with)? else {
                    eyre::bail!(i18n!("error-not-vessel"));
                };
                self.fields.rendezvous_with = Some(with);
                self.fields.rendezvous_lead_time = lead_time;
                self.fields
                    .apply_rendezvous(&mut self.hyperedit.editor, &mut self.sim)?;
                self.fields.refresh(&self.sim)?;
                self.orbit_applied(out)?;
            }
            Command::Land {
                body,
                lat,
                lon,
                alt,
                rotate,
            } => {
                self.landing.body = Some(self.body(&body)?);
                self.landing.lat = lat;
                self.landing.lon = lon;
                self.landing.alt = alt;
                self.landing.set_rotation = rotate;
                self.toggle_landing(out)?;
            }
            Command::Drop => {
                let active = self.active()?;
                if self.hyperedit.lander.is_landing(active) {
                    self.toggle_landing(out)?;
                } else {
                    writeln!(out, "{}", i18n!("no-session"))?;
                }
            }
            Command::LandHere => {
                let callback = self.manual_edit_callback();
                if self.hyperedit.lander.land_here(&self.sim, Some(callback))? {
                    writeln!(out, "{}", i18n!("landing-here"))?;
                } else {
                    writeln!(out, "{}", i18n!("landing-already"))?;
                }
            }
            Command::Nudge(input) => {
                let active = self.active()?;
                if !self.hyperedit.lander.is_landing(active) {
                    writeln!(out, "{}", i18n!("no-session"))?;
                    return Ok(true);
                }
                self.hyperedit.frame_update(&mut self.sim, input);
                self.sync_landing_fields();
                writeln!(
                    out,
                    "{}",
                    i18n_args!(
                        "nudged",
                        "lat",
                        self.landing.lat.clone(),
                        "lon",
                        self.landing.lon.clone()
                    )
                )?;
            }
            Command::Copy(index) => {
                let vessel = match index {
                    Some(i) => match self.target(i)? {
                        OrbitTarget::Vessel(v) => v,
                        OrbitTarget::Body(_) => eyre::bail!(i18n!("error-not-vessel")),
                    },
                    None => self.active()?,
                };
                let target = target_from_vessel(&self.sim, vessel)?;
                self.landing
                    .load(target.lat, target.lon, target.alt, target.body);
                writeln!(
                    out,
                    "{}",
                    i18n_args!("copied", "lat", target.lat, "lon", target.lon, "alt", target.alt)
                )?;
            }
            Command::Landed => {
                let landed = landed_vessels(&self.sim);
                if landed.is_empty() {
                    writeln!(out, "{}", i18n!("landed-none"))?;
                }
                for id in landed {
                    writeln!(out, "  {}", target_name(&self.sim, OrbitTarget::Vessel(id)))?;
                }
            }
            Command::Tick(count) => self.tick(count, out)?,
            Command::Scene(name) => {
                let scene = match name.to_ascii_lowercase().as_str() {
                    "menu" | "mainmenu" => Scene::MainMenu,
                    "ksc" | "spacecenter" => Scene::SpaceCenter,
                    "editor" => Scene::Editor,
                    "flight" => Scene::Flight,
                    "tracking" | "trackingstation" => Scene::TrackingStation,
                    _ => eyre::bail!(i18n_args!("error-unknown-scene", "name", name)),
                };
                let open = self.hyperedit.on_scene_change(scene);
                writeln!(out, "{}", i18n_args!("scene-changed", "scene", format!("{scene:?}")))?;
                if open {
                    writeln!(out, "{}", i18n!("lander-opened"))?;
                }
            }
            Command::Save(name) => {
                let target = self.landing.parse()?;
                let body = self
                    .sim
                    .body(target.body)
                    .ok_or_eyre("landing body is missing")?
                    .name
                    .clone();
                let record = LandingCoordinates::new(name.clone(), body, target.lat, target.lon, target.alt);
                coords::save_as(&mut self.store, &self.sim, record)?;
                writeln!(out, "{}", i18n_args!("coords-saved", "name", name))?;
            }
            Command::Load(name) => {
                let record = match &name {
                    Some(name) => coords::find(&mut self.store, &self.sim, name)?,
                    None => coords::load_last(&mut self.store, &self.sim)?,
                };
                let Some(record) = record else {
                    writeln!(out, "{}", i18n!("coords-missing"))?;
                    return Ok(true);
                };
                let body = record.resolve_body(&self.sim).ok_or_else(|| {
                    eyre!(i18n_args!("error-unknown-body", "name", record.body.clone()))
                })?;
                self.landing.load(record.lat, record.lon, record.alt, body);
                writeln!(out, "{}", i18n_args!("coords-loaded", "name", record.name))?;
            }
            Command::Delete(name) => {
                if coords::delete(&mut self.store, &self.sim, &name)? {
                    writeln!(out, "{}", i18n_args!("coords-deleted", "name", name))?;
                } else {
                    writeln!(out, "{}", i18n!("coords-missing"))?;
                }
            }
            Command::Coords => {
                for c in coords::saved_coordinates(&mut self.store, &self.sim)? {
                    writeln!(
                        out,
                        "  {:<28} {:<8} {:>10.4} {:>10.4} {:>8}",
                        c.name, c.body, c.lat, c.lon, c.alt
                    )?;
                }
            }
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn toggle_landing(&mut self, out: &mut impl Write) -> eyre::Result<()> {
        let active = self.active()?;
        let target = match self.hyperedit.lander.session(active) {
            Some(session) => session.target,
            None => self.landing.parse()?,
        };
        let callback = self.manual_edit_callback();
        let toggle = self
            .hyperedit
            .toggle_landing(&self.sim, &mut self.store, target, Some(callback))?;
        match toggle {
            Toggle::Started => writeln!(
                out,
                "{}",
                i18n_args!(
                    "landing-started",
                    "lat",
                    target.lat,
                    "lon",
                    target.lon,
                    "alt",
                    target.alt
                )
            )?,
            Toggle::Stopped => writeln!(out, "{}", i18n!("landing-stopped"))?,
        }
        Ok(())
    }

    fn tick(&mut self, count: u32, out: &mut impl Write) -> eyre::Result<()> {
        for _ in 0..count {
            for (vessel, outcome) in self.hyperedit.fixed_update(&mut self.sim) {
                let name = target_name(&self.sim, OrbitTarget::Vessel(vessel));
                let message = match outcome {
                    LandingOutcome::Landed => i18n_args!("landing-finished", "vessel", name),
                    LandingOutcome::Deactivated => i18n_args!("landing-deactivated", "vessel", name),
                    LandingOutcome::Aborted(e) => {
                        i18n_args!("landing-aborted", "vessel", name, "reason", e.to_string())
                    }
                };
                writeln!(out, "{message}")?;
            }
            self.hyperedit
                .frame_update(&mut self.sim, NudgeInput::default());
            self.sim.step(self.physics_dt);
        }
        self.sync_landing_fields();
        writeln!(
            out,
            "{}",
            i18n_args!("ticked", "time", self.sim.universal_time().as_seconds())
        )?;
        Ok(())
    }

    fn status(&self, out: &mut impl Write) -> eyre::Result<()> {
        let now = self.sim.universal_time();
        writeln!(
            out,
            "{}",
            i18n_args!("status-time", "time", now.to_string(), "seconds", now.as_seconds())
        )?;
        let Some(id) = self.sim.active else {
            writeln!(out, "{}", i18n!("error-no-vessel"))?;
            return Ok(());
        };
        let vessel = self.sim.vessel(id).ok_or_eyre("active vessel is missing")?;
        let body = self.sim.body(vessel.body()).ok_or_eyre("reference body is missing")?;
        let (lat, lon) = body.lat_lon(now, vessel.position);
        let state = if vessel.landed {
            "landed"
        } else if vessel.splashed {
            "splashed"
        } else {
            "flying"
        };
        writeln!(
            out,
            "{}",
            i18n_args!(
                "status-vessel",
                "name",
                vessel.name.clone(),
                "body",
                body.name.clone(),
                "alt",
                format!("{:.1}", body.altitude(vessel.position)),
                "lat",
                format!("{lat:.4}"),
                "lon",
                format!("{:.4}", normalize_angle(lon, 0.0)),
                "state",
                state
            )
        )?;
        if let Some(session) = self.hyperedit.lander.session(id) {
            let phase = match session.phase() {
                LandingPhase::Armed => "armed",
                LandingPhase::Settling => "settling",
            };
            writeln!(
                out,
                "{}",
                i18n_args!(
                    "status-landing",
                    "phase",
                    phase,
                    "interim",
                    format!("{:.1}", session.interim_altitude)
                )
            )?;
        }
        Ok(())
    }
}

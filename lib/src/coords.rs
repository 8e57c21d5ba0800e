//! Named landing coordinates.
//!
//! Persistence is left to a [`CoordinateStore`]; this module only merges
//! stored records with the built-in ones and applies edits.

use color_eyre::eyre;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    bodies::BodyId,
    geodesy::normalize_angle,
    host::Host,
};

/// Name of the record updated every time a landing starts.
pub const RECENT_ENTRY: &str = "Most Recent";

const DEFAULT_ALTITUDE: f64 = 20.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandingCoordinates {
    pub name: String,
    /// Name of the reference body.
    pub body: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl LandingCoordinates {
    pub fn new(name: impl Into<String>, body: impl Into<String>, lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            lat,
            lon,
            alt,
        }
    }

    /// Parse an old-style `name,lat,lon[,alt[,body]]` line. Records
    /// without a body are on `home`.
    pub fn from_legacy_line(line: &str, home: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [name, lat, lon, rest @ ..] = fields.as_slice() else {
            return None;
        };
        if name.is_empty() {
            return None;
        }
        let lat = lat.parse().ok()?;
        let lon = lon.parse().ok()?;
        let alt = rest
            .first()
            .and_then(|a| a.parse().ok())
            .unwrap_or(DEFAULT_ALTITUDE);
        let body = rest.get(1).filter(|b| !b.is_empty()).unwrap_or(&home);
        Some(Self::new(*name, *body, lat, lon, alt))
    }

    pub fn to_legacy_line(&self) -> String {
        format!("{},{},{},{},{}", self.name, self.lat, self.lon, self.alt, self.body)
    }

    /// The reference body, if it exists in `host`.
    pub fn resolve_body(&self, host: &impl Host) -> Option<BodyId> {
        host.body_by_name(&self.body)
    }
}

/// Where saved coordinates live between sessions.
pub trait CoordinateStore {
    fn load(&mut self) -> eyre::Result<Vec<LandingCoordinates>>;
    fn save(&mut self, coords: &[LandingCoordinates]) -> eyre::Result<()>;
}

/// A store that forgets everything when dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStore(pub Vec<LandingCoordinates>);

impl CoordinateStore for MemoryStore {
    fn load(&mut self) -> eyre::Result<Vec<LandingCoordinates>> {
        Ok(self.0.clone())
    }

    fn save(&mut self, coords: &[LandingCoordinates]) -> eyre::Result<()> {
        self.0 = coords.to_vec();
        Ok(())
    }
}

/// Launch sites and other useful spots on the home body, plus Minmus if
/// it exists.
pub fn default_coordinates(host: &impl Host) -> Vec<LandingCoordinates> {
    let Some(home) = host.home_body().and_then(|id| host.body(id)) else {
        return vec![];
    };
    let home = home.name.as_str();
    let mut list = vec![
        LandingCoordinates::new("KSC Launch Pad", home, -0.0972, 285.4423, 20.0),
        LandingCoordinates::new("KSC Runway", home, -0.0486, 285.2823, 20.0),
        LandingCoordinates::new("KSC Beach - Wet", home, -0.048_626_27, 285.666, 20.0),
        LandingCoordinates::new("Airstrip Island Runway", home, -1.518, 288.1, 35.0),
        LandingCoordinates::new("Airstrip Island Beach - Wet", home, -1.518, 287.9503, 20.0),
    ];
    if host.body_by_name("Minmus").is_some() {
        list.push(LandingCoordinates::new(
            "Minmus Flats",
            "Minmus",
            0.562_859,
            175.968_846,
            20.0,
        ));
    }
    list
}

/// Stored records followed by every default whose name is not taken.
pub fn saved_coordinates(
    store: &mut impl CoordinateStore,
    host: &impl Host,
) -> eyre::Result<Vec<LandingCoordinates>> {
    let stored = store.load()?;
    Ok(stored
        .into_iter()
        .chain(default_coordinates(host))
        .unique_by(|c| c.name.clone())
        .collect())
}

/// Save `record`, replacing any record of the same name.
pub fn save_as(
    store: &mut impl CoordinateStore,
    host: &impl Host,
    record: LandingCoordinates,
) -> eyre::Result<()> {
    let mut saved = saved_coordinates(store, host)?;
    saved.retain(|c| c.name != record.name);
    debug!(name = %record.name, "saving landing coordinates");
    saved.push(record);
    store.save(&saved)
}

/// Record the coordinates of the landing that just started.
pub fn save_recent(
    store: &mut impl CoordinateStore,
    host: &impl Host,
    body: BodyId,
    lat: f64,
    lon: f64,
    alt: f64,
) -> eyre::Result<()> {
    let Some(body) = host.body(body) else {
        return Ok(());
    };
    let record = LandingCoordinates::new(RECENT_ENTRY, body.name.clone(), lat, lon, alt);
    save_as(store, host, record)
}

/// Returns `false` if nothing had that name.
pub fn delete(store: &mut impl CoordinateStore, host: &impl Host, name: &str) -> eyre::Result<bool> {
    let mut saved = saved_coordinates(store, host)?;
    let before = saved.len();
    saved.retain(|c| c.name != name);
    if saved.len() == before {
        return Ok(false);
    }
    store.save(&saved)?;
    Ok(true)
}

pub fn find(
    store: &mut impl CoordinateStore,
    host: &impl Host,
    name: &str,
) -> eyre::Result<Option<LandingCoordinates>> {
    Ok(saved_coordinates(store, host)?
        .into_iter()
        .find(|c| c.name == name))
}

/// The most recent landing, with its latitude wrapped into `[-180, 180)`.
pub fn load_last(
    store: &mut impl CoordinateStore,
    host: &impl Host,
) -> eyre::Result<Option<LandingCoordinates>> {
    Ok(find(store, host, RECENT_ENTRY)?.map(|mut c| {
        c.lat = normalize_angle(c.lat, -180.0);
        c
    }))
}

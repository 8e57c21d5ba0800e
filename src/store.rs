use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::eyre::{self, WrapErr};
use hyperedit::coords::{CoordinateStore, LandingCoordinates};
use tracing::{debug, info};

/// Landing coordinates kept in a RON file. If the file does not exist
/// yet, records are imported from an old comma-separated list.
#[derive(Clone, Debug)]
pub struct RonStore {
    path: PathBuf,
    legacy: Option<PathBuf>,
    /// Body assumed by legacy records that do not name one.
    home: String,
}

impl RonStore {
    pub fn new(path: impl Into<PathBuf>, legacy: Option<PathBuf>, home: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            legacy,
            home: home.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_legacy(&self, path: &Path) -> eyre::Result<Vec<LandingCoordinates>> {
        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let coords: Vec<_> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| LandingCoordinates::from_legacy_line(l, &self.home))
            .collect();
        info!(count = coords.len(), path = %path.display(), "imported legacy landing coordinates");
        Ok(coords)
    }
}

impl CoordinateStore for RonStore {
    fn load(&mut self) -> eyre::Result<Vec<LandingCoordinates>> {
        if self.path.exists() {
            let text = fs::read_to_string(&self.path)
                .wrap_err_with(|| format!("failed to read {}", self.path.display()))?;
            return ron::from_str(&text)
                .wrap_err_with(|| format!("malformed coordinates in {}", self.path.display()));
        }
        match &self.legacy {
            Some(legacy) if legacy.exists() => self.load_legacy(legacy),
            _ => Ok(vec![]),
        }
    }

    fn save(&mut self, coords: &[LandingCoordinates]) -> eyre::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let text = ron::ser::to_string_pretty(
            coords,
            ron::ser::PrettyConfig::default().struct_names(true),
        )?;
        fs::write(&self.path, text)
            .wrap_err_with(|| format!("failed to write {}", self.path.display()))?;
        debug!(count = coords.len(), path = %self.path.display(), "saved landing coordinates");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hyperedit-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn saves_and_loads() {
        let dir = scratch("ron");
        let mut store = RonStore::new(dir.join("coords.ron"), None, "Kerbin");
        assert!(store.load().unwrap().is_empty());
        let coords = vec![
            LandingCoordinates::new("Pad", "Kerbin", -0.0972, 285.4423, 20.0),
            LandingCoordinates::new("Crater", "Mun", 3.0, -40.5, 100.0),
        ];
        store.save(&coords).unwrap();
        assert_eq!(store.load().unwrap(), coords);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn imports_legacy_list_until_saved() {
        let dir = scratch("legacy");
        let legacy = dir.join("landcoords.txt");
        fs::write(&legacy, "Pad,-0.0972,285.4423\n\nbroken line\nCrater,1,2,300,Mun\n").unwrap();
        let mut store = RonStore::new(dir.join("coords.ron"), Some(legacy), "Kerbin");
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].body, "Kerbin");
        assert_eq!(loaded[0].alt, 20.0);
        assert_eq!(loaded[1].body, "Mun");

        store.save(&loaded[..1]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
        fs::remove_dir_all(dir).unwrap();
    }
}

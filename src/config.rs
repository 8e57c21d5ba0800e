use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use color_eyre::eyre::{self, WrapErr};
use hyperedit::lander::LandingTuning;
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "HYPEREDIT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "hyperedit.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Where saved landing coordinates live.
    pub data_dir: PathBuf,
    pub auto_open_lander: bool,
    /// Length of one physics tick (`s`).
    pub physics_dt: f64,
    pub landing: LandingTuning,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            data_dir: PathBuf::from("."),
            auto_open_lander: false,
            physics_dt: 0.02,
            landing: LandingTuning::default(),
        }
    }
}

impl Config {
    /// `$HYPEREDIT_CONFIG`, or `hyperedit.toml` in the working directory.
    pub fn path() -> PathBuf {
        env::var_os(CONFIG_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Read the config at `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)
                .wrap_err_with(|| format!("invalid config in {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).wrap_err_with(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn from_toml(text: &str) -> eyre::Result<Self> {
        let config: Self = toml::from_str(text)?;
        if !config.physics_dt.is_finite() || config.physics_dt <= 0.0 {
            eyre::bail!("physics_dt must be a positive number of seconds");
        }
        if config.landing.descent_divisor.is_nan() || config.landing.descent_divisor <= 1.0 {
            eyre::bail!("landing.descent_divisor must be greater than 1");
        }
        Ok(config)
    }

    pub fn coordinates_path(&self) -> PathBuf {
        self.data_dir.join("landcoords.ron")
    }

    /// The comma-separated list older versions wrote.
    pub fn legacy_coordinates_path(&self) -> PathBuf {
        self.data_dir.join("landcoords.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            auto_open_lander = true
            data_dir = "saves"

            [landing]
            nudge_step = 5.0
            "#,
        )
        .unwrap();
        assert!(config.auto_open_lander);
        assert_eq!(config.coordinates_path(), Path::new("saves").join("landcoords.ron"));
        assert_eq!(config.landing.nudge_step, 5.0);
        assert_eq!(config.landing.descent_divisor, 10.0);
        assert_eq!(config.physics_dt, 0.02);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_toml("physics_dt = 0.0").is_err());
        assert!(Config::from_toml("[landing]\ndescent_divisor = 1.0").is_err());
        assert!(Config::from_toml("physics_dt = \"fast\"").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let path = env::temp_dir().join("hyperedit-no-such-config.toml");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }
}

//! Container engine selection.
//!
//! The preferred engine is stored per user as `{"driver": "docker"}` in
//! `<config dir>/kitt/config.json`. No file means Docker.

use crate::constants::{SETTINGS_DIR, SETTINGS_FILE};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Supported container engines.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Docker,
    Podman,
}

impl Driver {
    /// Engine executable name.
    pub fn binary(&self) -> &'static str {
        match self {
            Driver::Docker => "docker",
            Driver::Podman => "podman",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Local kitt settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub driver: Driver,
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Loads settings from the default location.
    ///
    /// A missing file yields defaults; an unreadable or malformed one is
    /// logged and also yields defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Loads settings from `path`; defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Writes settings to `path`, creating parent directories.
    ///
    /// Refuses to replace an existing file unless `force` is set.
    pub fn save_to(&self, path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(Error::SettingsExist {
                path: path.to_path_buf(),
            });
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_defaults_to_docker() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings.driver, Driver::Docker);
    }

    #[test]
    fn test_save_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kitt").join("config.json");
        let podman = Settings {
            driver: Driver::Podman,
        };

        podman.save_to(&path, false).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), podman);

        let err = Settings::default().save_to(&path, false).unwrap_err();
        assert!(matches!(err, Error::SettingsExist { .. }));

        Settings::default().save_to(&path, true).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap().driver, Driver::Docker);
    }

    #[test]
    fn test_file_format() {
        let json = serde_json::to_string(&Settings {
            driver: Driver::Podman,
        })
        .unwrap();
        assert_eq!(json, r#"{"driver":"podman"}"#);
    }
}

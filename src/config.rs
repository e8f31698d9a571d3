//! Persisted user configuration: a best-effort `gcfflasher.toml` under the
//! platform config directory. Every CLI flag takes precedence over this
//! file, and a missing or unreadable file is silently treated as defaults.

use std::fs::{create_dir_all, read_to_string, write};
use std::path::PathBuf;

use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Last-used serial port, offered as a fallback when `-d` is omitted.
    #[serde(default)]
    pub default_port: Option<String>,
    /// Overrides the default programming retry deadline.
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
    /// Skip straight to a specific reset mechanism before falling through
    /// to the normal fallback sequence.
    #[serde(default)]
    pub preferred_reset: Option<String>,
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("com", "dresden-elektronik", "gcfflasher")?;
        Some(dirs.config_dir().join("gcfflasher.toml"))
    }

    /// Loads configuration, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match read_to_string(&path) {
            Ok(data) => match toml::from_str(&data) {
                Ok(config) => {
                    debug!("loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    debug!("failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let serialized = toml::to_string(self).expect("Config always serializes");
        write(&path, serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let config = Config {
            default_port: Some("/dev/ttyACM0".into()),
            default_timeout_secs: Some(20),
            preferred_reset: Some("ftdi".into()),
        };
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.default_port, config.default_port);
        assert_eq!(parsed.default_timeout_secs, config.default_timeout_secs);
        assert_eq!(parsed.preferred_reset, config.preferred_reset);
    }

    #[test]
    fn missing_fields_default_to_none() {
        let parsed: Config = toml::from_str("").unwrap();
        assert!(parsed.default_port.is_none());
        assert!(parsed.default_timeout_secs.is_none());
    }
}

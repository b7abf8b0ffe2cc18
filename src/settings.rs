//! Code for loading program settings.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::log::DEFAULT_LOG_LEVEL;

const SETTINGS_FILE_NAME: &str = "settings.toml";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Program settings, read from `settings.toml` next to the scenario if present.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether to write a log file into the scenario directory
    #[serde(default)]
    pub log_to_file: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_to_file: false,
        }
    }
}

impl Settings {
    /// Read the settings file from the given directory.
    ///
    /// If the file is not present, default values are used.
    pub fn from_path(dir: &Path) -> Result<Settings> {
        let file_path = dir.join(SETTINGS_FILE_NAME);
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(&file_path)
            .with_context(|| format!("Could not read {}", file_path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Could not parse {}", file_path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_settings_from_path_no_file() {
        let dir = tempdir().unwrap();
        assert_eq!(
            Settings::from_path(dir.path()).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_settings_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
            writeln!(file, "log_level = \"debug\"\nlog_to_file = true").unwrap();
        }

        let settings = Settings::from_path(dir.path()).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert!(settings.log_to_file);
    }

    #[test]
    fn test_settings_bad_toml() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SETTINGS_FILE_NAME)).unwrap();
            writeln!(file, "log_level = [nonsense").unwrap();
        }

        assert!(Settings::from_path(dir.path()).is_err());
    }
}

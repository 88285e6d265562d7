use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the data directory (database, socket, log, config)
pub const DATA_DIR_ENV: &str = "TABTRACK_DATA_DIR";
/// Overrides `backend_url` from the config file
pub const BACKEND_URL_ENV: &str = "TABTRACK_BACKEND_URL";

const CONFIG_FILE: &str = "config.toml";

/// Get the local data directory for tabtrack.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("tabtrack");
    Ok(path)
}

/// Path of the IPC socket inside the data directory
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn socket_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("tabtrack.sock"))
}

/// Host configuration read from `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    pub sync_enabled: bool,
    pub retention_days: u32,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:3000".to_string(),
            sync_enabled: true,
            retention_days: 30,
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load `config.toml` from the data directory, falling back to defaults
    /// when the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&get_data_dir()?.join(CONFIG_FILE))?;
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            log::debug!("Backend URL overridden by {BACKEND_URL_ENV}");
            config.backend_url = url;
        }
        Ok(config)
    }

    /// Load a config file at an explicit path
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config in {}", path.display()))
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.retention_days, 30);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "backend_url = \"https://tracker.example\"\nsync_enabled = false\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend_url, "https://tracker.example");
        assert!(!config.sync_enabled);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "retention_days = \"soon\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}

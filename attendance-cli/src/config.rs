//! Configuration loading and parsing
//!
//! Every field is optional; a missing file means "all defaults".
//!
//! ```toml
//! [store]
//! path = "/srv/attendance/attendance.json"
//! cooldown_secs = 60
//!
//! [reader]
//! libnfc = ["libnfc.so.6"]
//! libfreefare = ["libfreefare.so.0"]
//! device = "pn532_uart:/dev/ttyUSB0"
//! poll_interval_ms = 500
//! ```

use anyhow::{Context, Result};
use attendance_core::reader::NfcLibraries;
use attendance_core::{StoreConfig, TrackerConfig, DEFAULT_COOLDOWN_SECS, DEFAULT_POLL_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the store when no path is configured
pub const DEFAULT_STORE_FILE: &str = "attendance.json";

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub reader: ReaderSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSection {
    /// Store file (default: ~/attendance.json)
    pub path: Option<PathBuf>,
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: i64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: None,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

fn default_cooldown() -> i64 {
    DEFAULT_COOLDOWN_SECS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReaderSection {
    /// libnfc shared-library names to try (empty = built-in list)
    #[serde(default)]
    pub libnfc: Vec<String>,
    /// libfreefare shared-library names to try (empty = built-in list)
    #[serde(default)]
    pub libfreefare: Vec<String>,
    /// libnfc connection string of the reader to use (default: first found)
    pub device: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            libnfc: Vec::new(),
            libfreefare: Vec::new(),
            device: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl AppConfig {
    /// Store location: explicit override, then config, then the home directory
    pub fn store_path(&self, override_path: Option<&Path>) -> PathBuf {
        if let Some(path) = override_path {
            return path.to_path_buf();
        }
        if let Some(path) = &self.store.path {
            return path.clone();
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_STORE_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE))
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new().with_cooldown_secs(self.store.cooldown_secs)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig::new().with_poll_interval_ms(self.reader.poll_interval_ms)
    }

    pub fn nfc_libraries(&self) -> NfcLibraries {
        let mut libs = NfcLibraries::default();
        if !self.reader.libnfc.is_empty() {
            libs.libnfc = self.reader.libnfc.clone();
        }
        if !self.reader.libfreefare.is_empty() {
            libs.libfreefare = self.reader.libfreefare.clone();
        }
        libs
    }
}

/// Default config location: <config dir>/attendance/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("attendance").join("config.toml"))
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Load the explicit config file, or the default one if it exists, or defaults
pub fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            log::debug!("Using config file {:?}", path);
            load_config(&path)
        }
        _ => {
            log::debug!("No config file, using defaults");
            Ok(AppConfig::default())
        }
    }
}

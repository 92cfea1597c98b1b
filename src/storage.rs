//! Dashboard settings storage.
//!
//! Settings are kept as JSON in `dashboard.json` under the app data
//! directory. Environment variables override individual keys, which is how
//! the counter machines are usually provisioned.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::DashboardError;

pub const CONFIG_FILE: &str = "dashboard.json";

const APP_DIR_NAME: &str = "counter-dashboard";
const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

// Environment keys
const ENV_DATA_DIR: &str = "COUNTER_DASHBOARD_DATA_DIR";
const ENV_SERVICE_URL: &str = "COUNTER_DASHBOARD_URL";
const ENV_POLL_SECS: &str = "COUNTER_DASHBOARD_POLL_SECS";
const ENV_TIMEOUT_SECS: &str = "COUNTER_DASHBOARD_TIMEOUT_SECS";
const ENV_DEMO: &str = "COUNTER_DASHBOARD_DEMO";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub service_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Run against the in-process service instead of `service_url`.
    pub demo_mode: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            poll_interval_secs: 3,
            request_timeout_secs: 30,
            demo_mode: false,
        }
    }
}

impl DashboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.poll_interval_secs == 0 {
            return Err(DashboardError::Config(
                "poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(DashboardError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if !self.demo_mode && self.service_url.trim().is_empty() {
            return Err(DashboardError::Config("service_url is empty".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Base directory for settings and logs.
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                .join(".local")
                .join("share")
        });
    base.join(APP_DIR_NAME)
}

pub fn config_path() -> PathBuf {
    get_data_dir().join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Read settings from `path`. A missing file is `Ok(None)`; keys absent from
/// the file take their defaults.
pub fn read_config_file(path: &Path) -> Result<Option<DashboardConfig>, DashboardError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DashboardError::Config(format!(
                "Failed to read {}: {e}",
                path.display()
            )))
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| DashboardError::Config(format!("Invalid {}: {e}", path.display())))
}

pub fn write_config_file(path: &Path, config: &DashboardConfig) -> Result<(), DashboardError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DashboardError::Config(format!("Failed to create data dir: {e}")))?;
    }
    let body = serde_json::to_string_pretty(config)
        .map_err(|e| DashboardError::Config(format!("serialize settings: {e}")))?;
    fs::write(path, body)
        .map_err(|e| DashboardError::Config(format!("Failed to write {}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_secs(key: &str, raw: &str) -> Result<u64, DashboardError> {
    raw.parse::<u64>()
        .map_err(|_| DashboardError::Config(format!("{key} must be a whole number of seconds, got {raw:?}")))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, DashboardError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DashboardError::Config(format!("{key} must be a boolean, got {raw:?}"))),
    }
}

pub fn apply_env_overrides(config: &mut DashboardConfig) -> Result<(), DashboardError> {
    if let Some(url) = env_value(ENV_SERVICE_URL) {
        config.service_url = url;
    }
    if let Some(raw) = env_value(ENV_POLL_SECS) {
        config.poll_interval_secs = parse_secs(ENV_POLL_SECS, &raw)?;
    }
    if let Some(raw) = env_value(ENV_TIMEOUT_SECS) {
        config.request_timeout_secs = parse_secs(ENV_TIMEOUT_SECS, &raw)?;
    }
    if let Some(raw) = env_value(ENV_DEMO) {
        config.demo_mode = parse_flag(ENV_DEMO, &raw)?;
    }
    Ok(())
}

/// Load settings from `path` (writing defaults there on first run), apply
/// environment overrides and validate.
pub fn load_config_from(path: &Path) -> Result<DashboardConfig, DashboardError> {
    let mut config = match read_config_file(path)? {
        Some(config) => config,
        None => {
            let config = DashboardConfig::default();
            match write_config_file(path, &config) {
                Ok(()) => info!("Created default settings at {}", path.display()),
                Err(e) => warn!("Could not write default settings: {e}"),
            }
            config
        }
    };
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config() -> Result<DashboardConfig, DashboardError> {
    load_config_from(&config_path())
}

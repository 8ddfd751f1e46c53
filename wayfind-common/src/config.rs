//! Configuration file resolution and loading
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WAYFIND_CONFIG";

/// Logging section shared by every binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Locate the config file
///
/// Returns `None` when no file exists at any candidate location; callers then
/// run on compiled defaults plus environment overrides.
pub fn resolve_config_path(cli_arg: Option<&Path>, app_name: &str) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument (must exist if given)
    if let Some(path) = cli_arg {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    // Priority 2: Environment variable
    if let Some(path) = env_value(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "{} points to a missing file: {}",
                CONFIG_ENV_VAR,
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 3: user config dir, then system-wide
    let user_config = dirs::config_dir().map(|d| d.join(app_name).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc").join(app_name).join("config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
    }

    debug!("No config file found for {}, using defaults", app_name);
    Ok(None)
}

/// Parse a TOML file into `T`, or return `T::default()` when there is no file
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let config = toml::from_str(&content)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(T::default()),
    }
}

/// Default folder for persisted state (durable cache database)
pub fn default_data_folder(app_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(app_name))
        .unwrap_or_else(|| PathBuf::from(format!("./{}_data", app_name)))
}

/// Read an environment variable, treating empty/whitespace values as unset
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_valid_key(v))
}

/// Parse an environment variable, ignoring values that do not parse
pub fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_value(name).and_then(|v| v.trim().parse().ok())
}

/// Validate a credential or setting value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// First valid value in priority order
pub fn first_valid<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|v| is_valid_key(v))
        .map(str::to_string)
}

//! Client configuration file.
//!
//! The config lives in a small JSON file (see [`crate::paths`]):
//!
//! ```json
//! { "citadel_url": "http://citadel.example.com", "auth_token": "..." }
//! ```
//!
//! When no file exists yet, values are taken from `CITADEL_URL` and
//! `CITADEL_AUTH_TOKEN` and the caller may persist them with [`save_config`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transport::ClientConfig;

/// Server used when neither the config file nor the environment names one.
pub const DEFAULT_CITADEL_URL: &str = "http://citadel.ricebook.net";

pub const URL_ENV: &str = "CITADEL_URL";
pub const AUTH_TOKEN_ENV: &str = "CITADEL_AUTH_TOKEN";

/// Persisted client settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citadel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Whole-request timeout, in seconds. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl CliConfig {
    /// Build a config from environment lookups.
    ///
    /// Takes the lookup as a closure so callers (and tests) can supply
    /// something other than the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            citadel_url: Some(non_empty(URL_ENV).unwrap_or_else(|| DEFAULT_CITADEL_URL.to_string())),
            auth_token: non_empty(AUTH_TOKEN_ENV),
            timeout_secs: None,
            zone: None,
        }
    }

    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Turn the file settings into transport settings.
    ///
    /// `zone` overrides the zone stored in the file. A missing auth token is
    /// a configuration error.
    pub fn client_config(&self, zone: Option<String>) -> Result<ClientConfig, ConfigError> {
        let token = self
            .auth_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingAuthToken)?;

        let url = self
            .citadel_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_CITADEL_URL);

        let mut config = ClientConfig::new(url).auth_token(token);
        if let Some(zone) = zone.or_else(|| self.zone.clone()) {
            config = config.zone(zone);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

/// Load the config file. Returns `Ok(None)` if it does not exist.
pub fn load_config(path: &Path) -> Result<Option<CliConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

/// Save the config file using write-then-rename.
pub fn save_config(path: &Path, config: &CliConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
    }

    let temp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(&temp_path, json).map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(io_err)?;

    Ok(())
}

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

/// File name of the client config inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".corecli.json";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "CITADEL_CONFIG_PATH";

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Ok(PathBuf::from(profile));
        }
    }

    Err(ConfigError::NoHomeDir)
}

/// Config file location: `$CITADEL_CONFIG_PATH`, else `~/.corecli.json`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    Ok(home_dir()?.join(CONFIG_FILE_NAME))
}

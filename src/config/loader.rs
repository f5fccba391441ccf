// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HotdagError, Result};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| HotdagError::io(path, e))?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the config for a CLI invocation.
///
/// - An explicit path must exist.
/// - The default path falls back to built-in defaults when absent.
pub fn load_or_default(explicit: Option<&Path>) -> Result<(PathBuf, ConfigFile)> {
    match explicit {
        Some(path) => Ok((path.to_path_buf(), load_and_validate(path)?)),
        None => {
            let path = default_config_path();
            if path.exists() {
                let cfg = load_and_validate(&path)?;
                Ok((path, cfg))
            } else {
                info!(?path, "no config file found; using defaults");
                let cfg = ConfigFile::try_from(RawConfigFile::default())?;
                Ok((path, cfg))
            }
        }
    }
}

/// Default config location: `Hotdag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Hotdag.toml")
}

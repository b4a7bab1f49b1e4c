// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{CoordinatorConfig, RawCoordinatorConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw config.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawCoordinatorConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawCoordinatorConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for embedding applications:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks dispatcher limits.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<CoordinatorConfig> {
    let raw_config = load_from_path(&path)?;
    let config = CoordinatorConfig::try_from(raw_config)?;
    Ok(config)
}

/// Default config location: `Dagcoord.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Dagcoord.toml")
}

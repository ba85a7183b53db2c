// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawSuiteConfig, SuiteConfig};
use crate::errors::Result;

/// Load a suite file and return the raw, unvalidated model.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for
/// anything that will be handed to the coordinator.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSuiteConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawSuiteConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a suite file and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks timeouts, commands and platform names.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SuiteConfig> {
    let raw = load_from_path(&path)?;
    let config = SuiteConfig::try_from(raw)?;
    Ok(config)
}

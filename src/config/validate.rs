// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{RawSuiteConfig, SuiteConfig};
use crate::errors::{Result, TestCtlError};

impl TryFrom<RawSuiteConfig> for SuiteConfig {
    type Error = TestCtlError;

    fn try_from(raw: RawSuiteConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(SuiteConfig::new_unchecked(raw.config, raw.test))
    }
}

fn validate_raw_config(cfg: &RawSuiteConfig) -> Result<()> {
    validate_global_config(cfg)?;
    validate_tests(cfg)?;
    Ok(())
}

/// Convert a timeout in seconds, rejecting values a `Duration` cannot hold.
pub(crate) fn timeout_from_secs(what: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(TestCtlError::ConfigError(format!(
            "{what} must be a positive number of seconds (got {secs})"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| TestCtlError::ConfigError(format!("{what} is out of range ({secs}): {e}")))
}

fn validate_global_config(cfg: &RawSuiteConfig) -> Result<()> {
    timeout_from_secs("[config].default_timeout", cfg.config.default_timeout)?;

    if let Some(ref platform) = cfg.config.platform {
        if platform.trim().is_empty() {
            return Err(TestCtlError::ConfigError(
                "[config].platform must not be blank".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_tests(cfg: &RawSuiteConfig) -> Result<()> {
    for (name, test) in cfg.test.iter() {
        if test.cmd.trim().is_empty() {
            return Err(TestCtlError::ConfigError(format!(
                "test '{name}' has an empty `cmd`"
            )));
        }
        if let Some(timeout) = test.timeout {
            timeout_from_secs(&format!("test '{name}' timeout"), timeout)?;
        }
        if test.platforms.iter().any(|p| p.trim().is_empty()) {
            return Err(TestCtlError::ConfigError(format!(
                "test '{name}' lists a blank platform name"
            )));
        }
    }
    Ok(())
}

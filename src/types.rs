// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Build configuration the host was launched under.
///
/// The debugger gate only takes effect in `Debug`. This is resolved once at
/// startup (config file or `--build-mode`) instead of being a compile-time
/// switch, so both behaviours are reachable from the same binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Debug,
    #[default]
    Release,
}

impl BuildMode {
    pub fn is_debug(self) -> bool {
        matches!(self, BuildMode::Debug)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Debug => f.write_str("debug"),
            BuildMode::Release => f.write_str("release"),
        }
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(BuildMode::Debug),
            "release" => Ok(BuildMode::Release),
            other => Err(format!(
                "invalid build_mode: {other} (expected \"debug\" or \"release\")"
            )),
        }
    }
}

/// Name of the platform the suite is running on, e.g. `"linux"`.
///
/// Units compare against this when answering `supports_current_platform`.
pub fn host_platform() -> String {
    std::env::consts::OS.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mode_parses_case_insensitively() {
        assert_eq!(" Debug ".parse::<BuildMode>(), Ok(BuildMode::Debug));
        assert_eq!("RELEASE".parse::<BuildMode>(), Ok(BuildMode::Release));
        assert!("profile".parse::<BuildMode>().is_err());
    }

    #[test]
    fn release_is_the_default() {
        assert_eq!(BuildMode::default(), BuildMode::Release);
        assert!(!BuildMode::default().is_debug());
    }
}

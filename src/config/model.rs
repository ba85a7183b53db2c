// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::poll::DEFAULT_TIMEOUT;
use crate::types::BuildMode;

/// Suite file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// default_timeout = 5.0
/// wait_for_debugger = false
/// build_mode = "release"
///
/// [test.login]
/// cmd = "sh ./login.sh"
/// platforms = ["linux", "macos"]
/// wait_for = "out/logged-in"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawSuiteConfig {
    /// Coordinator settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All units from `[test.<name>]`, keyed by unit name.
    #[serde(default)]
    pub test: BTreeMap<String, TestConfig>,
}

/// Validated suite. Only constructible through `TryFrom<RawSuiteConfig>`.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub config: ConfigSection,
    pub test: BTreeMap<String, TestConfig>,
}

impl SuiteConfig {
    pub(crate) fn new_unchecked(config: ConfigSection, test: BTreeMap<String, TestConfig>) -> Self {
        Self { config, test }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Default readiness timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout: f64,

    /// Hold each run until a debugger acknowledgment arrives.
    /// Ignored unless `build_mode = "debug"`.
    #[serde(default)]
    pub wait_for_debugger: bool,

    #[serde(default)]
    pub build_mode: BuildMode,

    /// Platform name units are matched against. Defaults to the host OS.
    #[serde(default)]
    pub platform: Option<String>,
}

fn default_timeout_secs() -> f64 {
    5.0
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout_secs(),
            wait_for_debugger: false,
            build_mode: BuildMode::default(),
            platform: None,
        }
    }
}

impl ConfigSection {
    /// Range-checked on load; an unvalidated out-of-range value falls back
    /// to [`DEFAULT_TIMEOUT`].
    pub fn default_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_timeout).unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn platform(&self) -> String {
        self.platform
            .clone()
            .unwrap_or_else(crate::types::host_platform)
    }
}

/// `[test.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TestConfig {
    /// Shell command making up the unit.
    pub cmd: String,

    /// Platforms the unit supports; empty means all of them.
    #[serde(default)]
    pub platforms: Vec<String>,

    /// Focused units exclude every unfocused one from the run.
    #[serde(default)]
    pub focus: bool,

    /// Path polled for existence after `cmd` succeeds.
    #[serde(default)]
    pub wait_for: Option<PathBuf>,

    /// Per-unit poll timeout in seconds; falls back to `default_timeout`.
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl TestConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

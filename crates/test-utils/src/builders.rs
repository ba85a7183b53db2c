// crates/test-utils/src/builders.rs

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use testctl::config::{ConfigSection, RawSuiteConfig, SuiteConfig, TestConfig};
use testctl::types::BuildMode;
use testctl::unit::UnitRef;

use crate::fake_unit::{Behaviour, FakeUnit, Journal};

/// Builder for fake units.
pub struct FakeUnitBuilder {
    unit: FakeUnit,
}

impl FakeUnitBuilder {
    pub fn new(name: &str, journal: Journal) -> Self {
        Self {
            unit: FakeUnit {
                name: name.to_string(),
                supported: true,
                focused: false,
                behaviour: Behaviour::Pass,
                journal,
            },
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.unit.supported = false;
        self
    }

    pub fn focused(mut self) -> Self {
        self.unit.focused = true;
        self
    }

    pub fn fails(mut self, msg: &str) -> Self {
        self.unit.behaviour = Behaviour::Fail(msg.to_string());
        self
    }

    pub fn panics(mut self, msg: &str) -> Self {
        self.unit.behaviour = Behaviour::Panic(msg.to_string());
        self
    }

    pub fn sleeps(mut self, d: Duration) -> Self {
        self.unit.behaviour = Behaviour::Sleep(d);
        self
    }

    pub fn waits_for(mut self, flag: Arc<AtomicBool>, timeout: Option<Duration>) -> Self {
        self.unit.behaviour = Behaviour::WaitFor { flag, timeout };
        self
    }

    pub fn build(self) -> UnitRef {
        UnitRef::new(self.unit)
    }
}

/// Builder for `SuiteConfig` to simplify test setup.
pub struct SuiteConfigBuilder {
    config: RawSuiteConfig,
}

impl SuiteConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawSuiteConfig {
                config: ConfigSection::default(),
                test: BTreeMap::new(),
            },
        }
    }

    pub fn with_test(mut self, name: &str, test: TestConfig) -> Self {
        self.config.test.insert(name.to_string(), test);
        self
    }

    pub fn default_timeout(mut self, secs: f64) -> Self {
        self.config.config.default_timeout = secs;
        self
    }

    pub fn build_mode(mut self, mode: BuildMode) -> Self {
        self.config.config.build_mode = mode;
        self
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.config.config.platform = Some(platform.to_string());
        self
    }

    pub fn build(self) -> SuiteConfig {
        SuiteConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for SuiteConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TestConfig`.
pub struct TestConfigBuilder {
    test: TestConfig,
}

impl TestConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            test: TestConfig {
                cmd: cmd.to_string(),
                platforms: vec![],
                focus: false,
                wait_for: None,
                timeout: None,
            },
        }
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.test.platforms.push(platform.to_string());
        self
    }

    pub fn focus(mut self) -> Self {
        self.test.focus = true;
        self
    }

    pub fn wait_for(mut self, path: &str) -> Self {
        self.test.wait_for = Some(path.into());
        self
    }

    pub fn timeout(mut self, secs: f64) -> Self {
        self.test.timeout = Some(secs);
        self
    }

    pub fn build(self) -> TestConfig {
        self.test
    }
}

// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::BuildMode;

/// Command-line arguments for `testctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "testctl",
    version,
    about = "Run a suite of UI test units and signal the automation driver when done.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the suite file (TOML).
    ///
    /// Default: `Testctl.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Testctl.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TESTCTL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Build configuration to behave as (debug, release).
    ///
    /// Overrides `config.build_mode` from the suite file.
    #[arg(long, value_name = "MODE")]
    pub build_mode: Option<BuildMode>,

    /// Hold the run until Enter is pressed, so a debugger can be attached.
    ///
    /// Only honoured in debug build mode.
    #[arg(long)]
    pub wait_for_debugger: bool,

    /// Default readiness timeout in seconds.
    ///
    /// Overrides `config.default_timeout` from the suite file.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Parse + validate, print the selected tests, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    #[value(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse a level from an environment variable value, case-insensitively.
    pub fn from_env_value(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value.trim(), true).ok()
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

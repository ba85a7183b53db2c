// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::coordinator::RunState;

#[derive(Error, Debug)]
pub enum TestCtlError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A run was requested while another one is still active.
    #[error("Scheduling conflict: a run is already {0}")]
    SchedulingConflict(RunState),

    /// Settings may only change while the coordinator is idle.
    #[error("Settings locked: coordinator is {0}")]
    SettingsLocked(RunState),

    #[error("No run is waiting for a debugger acknowledgment")]
    NotAwaitingDebugAck,

    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("Primary context is no longer running")]
    PrimaryContextClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TestCtlError>;

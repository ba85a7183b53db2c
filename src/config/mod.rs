// src/config/mod.rs

//! Suite configuration for testctl.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a suite file from disk (`loader.rs`).
//! - Validate values before they reach the coordinator (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigSection, RawSuiteConfig, SuiteConfig, TestConfig};
pub(crate) use validate::timeout_from_secs;

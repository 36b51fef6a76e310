// src/config/mod.rs

//! Configuration loading and validation for installd.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and apply environment overrides
//!   (`loader.rs`).
//! - Validate it into a `ConfigFile` (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{
    apply_env_overrides, default_config_path, env_lookup, load_from_path, load_raw,
};
pub use model::{ConfigFile, InstallerSection, RawConfigFile, RawInstallerSection, ServerSection};
pub use validate::validate_config;

// src/errors.rs

//! Crate-wide error type and `Result` alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallerError {
    /// A start was requested while a run exists that has not been cleared.
    #[error("installer already running")]
    AlreadyRunning,

    /// Cancel (or a status query that needs a run) with no running installer.
    #[error("no running installer process")]
    NotRunning,

    #[error("failed to launch installer {script:?}: {source}")]
    LaunchFailure {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("progress side channel error: {0}")]
    SideChannel(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, InstallerError>;

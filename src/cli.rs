// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::RawConfigFile;

/// Command-line arguments for `installd`.
///
/// Flags given here win over both the config file and the environment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "installd",
    version,
    about = "Run an installer script and stream its output to web clients.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `installd.toml` in the current working directory if it
    /// exists, built-in defaults otherwise.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Address to listen on.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Directory with the web UI.
    #[arg(long, value_name = "DIR")]
    pub static_path: Option<PathBuf>,

    /// Installer executable.
    #[arg(long, value_name = "PATH")]
    pub installer: Option<PathBuf>,

    /// Start the installer as soon as the service is up.
    #[arg(long)]
    pub auto_install: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `INSTALLD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load and validate the configuration, print it, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, raw: &mut RawConfigFile) {
        if let Some(port) = self.port {
            raw.server.port = port;
        }
        if let Some(ref listen) = self.listen {
            raw.server.listen_address = listen.clone();
        }
        if let Some(ref static_path) = self.static_path {
            raw.server.static_path = static_path.clone();
        }
        if let Some(ref installer) = self.installer {
            raw.installer.script = Some(installer.clone());
        }
        if self.auto_install {
            raw.installer.auto_install = true;
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::model::RawConfigFile;
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** apply
/// environment overrides or validate (see `crate::resolve_config`).
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load the raw configuration.
///
/// - An explicit `path` must exist.
/// - Without one, [`default_config_path`] is used if present; otherwise
///   built-in defaults apply (the installer script then has to come from
///   the environment or the command line).
pub fn load_raw(path: Option<&Path>) -> Result<RawConfigFile> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            load_from_path(path)
        }
        None => {
            let default = default_config_path();
            if default.is_file() {
                info!(path = %default.display(), "loading configuration");
                load_from_path(&default)
            } else {
                debug!("no configuration file; using defaults");
                Ok(RawConfigFile::default())
            }
        }
    }
}

/// Apply the environment variables the installer image sets:
///
/// - `INSTALLER_SCRIPT`: installer executable;
/// - `BACK_END_IP_ADDRESS`: address to listen on;
/// - `AUTO_INSTALL`: `"true"` starts the installer at startup.
///
/// `lookup` is [`env_lookup`] in production; tests pass a map.
pub fn apply_env_overrides<F>(raw: &mut RawConfigFile, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(script) = lookup("INSTALLER_SCRIPT") {
        raw.installer.script = Some(PathBuf::from(script));
    }
    if let Some(address) = lookup("BACK_END_IP_ADDRESS") {
        raw.server.listen_address = address;
    }
    if let Some(auto) = lookup("AUTO_INSTALL") {
        raw.installer.auto_install = auto.trim() == "true";
    }
}

/// Read one variable from the process environment. A value that is not
/// valid UTF-8 is treated as unset.
pub fn env_lookup(name: &str) -> Option<String> {
    let value = std::env::var_os(name)?;
    match value.into_string() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, "ignoring environment variable with a non-UTF-8 value");
            None
        }
    }
}

/// `installd.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("installd.toml")
}

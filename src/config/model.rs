// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::SupervisorOptions;

/// Configuration as read from TOML, before environment overrides and
/// validation.
///
/// ```toml
/// [server]
/// listen_address = "localhost"
/// port = 8000
/// static_path = "static"
///
/// [installer]
/// script = "/usr/share/installd/installer.sh"
/// auto_install = false
/// output_drain_timeout = "5s"
///
/// [parameters]
/// NON_INTERACTIVE = "yes"
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub installer: RawInstallerSection,

    /// Default run parameters; the service environment overrides them.
    #[serde(default = "default_parameters")]
    pub parameters: BTreeMap<String, String>,
}

impl Default for RawConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            installer: RawInstallerSection::default(),
            parameters: default_parameters(),
        }
    }
}

fn default_parameters() -> BTreeMap<String, String> {
    BTreeMap::from([("NON_INTERACTIVE".to_string(), "yes".to_string())])
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Host or address to bind. Overridden by `BACK_END_IP_ADDRESS`.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for every path that is not an API route.
    #[serde(default = "default_static_path")]
    pub static_path: PathBuf,

    /// Frames queued per live subscriber before it is considered too slow
    /// and dropped.
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
}

fn default_listen_address() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_static_path() -> PathBuf {
    PathBuf::from("static")
}

fn default_subscriber_queue() -> usize {
    1024
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            port: default_port(),
            static_path: default_static_path(),
            subscriber_queue: default_subscriber_queue(),
        }
    }
}

impl ServerSection {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }
}

/// `[installer]` section as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInstallerSection {
    /// Executable to run. Overridden by `INSTALLER_SCRIPT`; required after
    /// all overrides are applied.
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Start the installer right after startup. Overridden by
    /// `AUTO_INSTALL=true`.
    #[serde(default)]
    pub auto_install: bool,

    /// Duration string (`"250ms"`, `"5s"`, `"1m"`).
    #[serde(default = "default_output_drain_timeout")]
    pub output_drain_timeout: String,

    /// Name under which the progress fifo path is passed to the installer.
    #[serde(default = "default_progress_parameter")]
    pub progress_parameter: String,
}

fn default_output_drain_timeout() -> String {
    "5s".to_string()
}

fn default_progress_parameter() -> String {
    "PROGRESS_PIPE".to_string()
}

impl Default for RawInstallerSection {
    fn default() -> Self {
        Self {
            script: None,
            auto_install: false,
            output_drain_timeout: default_output_drain_timeout(),
            progress_parameter: default_progress_parameter(),
        }
    }
}

/// Validated configuration used by the rest of the application.
///
/// Built through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub installer: InstallerSection,
    pub parameters: BTreeMap<String, String>,
}

/// Validated `[installer]` section.
#[derive(Debug, Clone)]
pub struct InstallerSection {
    pub script: PathBuf,
    pub auto_install: bool,
    pub output_drain_timeout: Duration,
    pub progress_parameter: String,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        server: ServerSection,
        installer: InstallerSection,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            server,
            installer,
            parameters,
        }
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            script: self.installer.script.clone(),
            output_drain_timeout: self.installer.output_drain_timeout,
        }
    }
}

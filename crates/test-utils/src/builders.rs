use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use installd::broadcast::OutputRegistry;
use installd::config::{ConfigFile, RawConfigFile};
use installd::exec::{RunParameters, Supervisor, SupervisorOptions};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.installer.script = Some(path.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn static_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.server.static_path = path.into();
        self
    }

    pub fn subscriber_queue(mut self, n: usize) -> Self {
        self.config.server.subscriber_queue = n;
        self
    }

    pub fn drain_timeout(mut self, value: &str) -> Self {
        self.config.installer.output_drain_timeout = value.to_string();
        self
    }

    pub fn parameter(mut self, name: &str, value: &str) -> Self {
        self.config
            .parameters
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write an executable `/bin/sh` script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

/// Supervisor for `script` with a fresh registry and empty parameters.
pub fn supervisor_for(script: &Path) -> Supervisor {
    supervisor_with(script, RunParameters::new())
}

pub fn supervisor_with(script: &Path, parameters: RunParameters) -> Supervisor {
    let options = SupervisorOptions {
        script: script.to_path_buf(),
        output_drain_timeout: Duration::from_secs(2),
    };
    Supervisor::new(options, parameters, Arc::new(OutputRegistry::new()))
}

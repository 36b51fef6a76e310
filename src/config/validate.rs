// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, InstallerSection, RawConfigFile};
use crate::errors::{InstallerError, Result};
use crate::exec::parameters::is_env_name;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::InstallerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;

        let RawConfigFile {
            server,
            installer,
            parameters,
        } = raw;

        let installer = InstallerSection {
            script: installer.script.unwrap_or_default(),
            auto_install: installer.auto_install,
            output_drain_timeout: parse_duration(&installer.output_drain_timeout)
                .map_err(InstallerError::ConfigError)?,
            progress_parameter: installer.progress_parameter,
        };

        Ok(ConfigFile::new_unchecked(server, installer, parameters))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_server(cfg)?;
    validate_installer(cfg)?;
    validate_parameters(cfg)?;
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.listen_address.trim().is_empty() {
        return Err(InstallerError::ConfigError(
            "[server].listen_address must not be empty".to_string(),
        ));
    }
    if cfg.server.subscriber_queue == 0 {
        return Err(InstallerError::ConfigError(
            "[server].subscriber_queue must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_installer(cfg: &RawConfigFile) -> Result<()> {
    match &cfg.installer.script {
        Some(script) if !script.as_os_str().is_empty() => {}
        _ => {
            return Err(InstallerError::ConfigError(
                "no installer script configured; set [installer].script or INSTALLER_SCRIPT"
                    .to_string(),
            ));
        }
    }

    if let Err(e) = parse_duration(&cfg.installer.output_drain_timeout) {
        return Err(InstallerError::ConfigError(format!(
            "[installer].output_drain_timeout: {e}"
        )));
    }

    if !is_env_name(&cfg.installer.progress_parameter) {
        return Err(InstallerError::ConfigError(format!(
            "[installer].progress_parameter '{}' is not a valid environment variable name",
            cfg.installer.progress_parameter
        )));
    }

    Ok(())
}

fn validate_parameters(cfg: &RawConfigFile) -> Result<()> {
    for (name, value) in cfg.parameters.iter() {
        if !is_env_name(name) {
            return Err(InstallerError::ConfigError(format!(
                "[parameters] key '{}' is not a valid environment variable name",
                name
            )));
        }
        if value.contains('\0') {
            return Err(InstallerError::ConfigError(format!(
                "[parameters].{} contains a NUL byte",
                name
            )));
        }
    }
    Ok(())
}

mod common;
use crate::common::ConfigBuilder;

use std::collections::HashMap;
use std::error::Error;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use installd::cli::{CliArgs, LogLevel};
use installd::config::{
    ConfigFile, RawConfigFile, apply_env_overrides, env_lookup, load_from_path, load_raw,
    parse_duration,
};
use installd::errors::InstallerError;
use installd::exec::RunParameters;
use installd::logging::resolve_level;

type TestResult = Result<(), Box<dyn Error>>;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn defaults_apply_to_an_empty_file() -> TestResult {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("installd.toml");
    std::fs::write(&path, "")?;

    let raw = load_from_path(&path)?;
    assert_eq!(raw.server.listen_address, "localhost");
    assert_eq!(raw.server.port, 8000);
    assert_eq!(raw.server.static_path, PathBuf::from("static"));
    assert_eq!(raw.server.subscriber_queue, 1024);
    assert_eq!(raw.installer.script, None);
    assert!(!raw.installer.auto_install);
    assert_eq!(raw.installer.progress_parameter, "PROGRESS_PIPE");
    assert_eq!(raw.parameters.get("NON_INTERACTIVE").map(String::as_str), Some("yes"));
    Ok(())
}

#[test]
fn full_file_is_parsed_and_validated() -> TestResult {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("installd.toml");
    std::fs::write(
        &path,
        r#"
[server]
listen_address = "0.0.0.0"
port = 9000
subscriber_queue = 16

[installer]
script = "/usr/share/installer/run.sh"
auto_install = true
output_drain_timeout = "250ms"

[parameters]
LANG = "C"
"#,
    )?;

    let cfg = ConfigFile::try_from(load_raw(Some(path.as_path()))?)?;
    assert_eq!(cfg.server.bind_address(), "0.0.0.0:9000");
    assert_eq!(cfg.server.subscriber_queue, 16);
    assert_eq!(cfg.installer.script, PathBuf::from("/usr/share/installer/run.sh"));
    assert!(cfg.installer.auto_install);
    assert_eq!(cfg.installer.output_drain_timeout, Duration::from_millis(250));
    // An explicit [parameters] table replaces the defaults.
    assert_eq!(cfg.parameters.len(), 1);

    let options = cfg.supervisor_options();
    assert_eq!(options.script, cfg.installer.script);
    Ok(())
}

#[test]
fn explicit_missing_file_is_an_error() {
    let err = load_raw(Some(std::path::Path::new("/nonexistent/installd.toml"))).unwrap_err();
    assert!(matches!(err, InstallerError::IoError(_)), "{err:?}");
}

#[test]
fn malformed_toml_is_an_error() -> TestResult {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[server\nport = 1")?;

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, InstallerError::TomlError(_)), "{err:?}");
    Ok(())
}

#[test]
fn missing_script_fails_validation() {
    let err = ConfigFile::try_from(RawConfigFile::default()).unwrap_err();
    assert!(matches!(err, InstallerError::ConfigError(ref msg) if msg.contains("INSTALLER_SCRIPT")));
}

#[test]
fn invalid_values_fail_validation() {
    let zero_queue = ConfigBuilder::new().script("/bin/true").subscriber_queue(0).raw();
    let bad_duration = ConfigBuilder::new().script("/bin/true").drain_timeout("soon").raw();
    let mut bad_progress = ConfigBuilder::new().script("/bin/true").raw();
    bad_progress.installer.progress_parameter = "A=B".to_string();
    let bad_parameter = ConfigBuilder::new().script("/bin/true").parameter("", "x").raw();

    for raw in [zero_queue, bad_duration, bad_progress, bad_parameter] {
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, InstallerError::ConfigError(_)), "{err:?}");
    }
}

#[test]
fn config_and_request_parameters_share_name_rules() {
    for name in ["", "A=B", "A\0B"] {
        let raw = ConfigBuilder::new().script("/bin/true").parameter(name, "x").raw();
        assert!(ConfigFile::try_from(raw).is_err(), "config accepted {name:?}");

        let mut parameters = RunParameters::new();
        parameters.merge(vec![(name.to_string(), "x".to_string())]);
        assert!(parameters.is_empty(), "request accepted {name:?}");
    }

    let raw = ConfigBuilder::new().script("/bin/true").parameter("DISK_1", "x").raw();
    assert!(ConfigFile::try_from(raw).is_ok());
}

#[test]
fn non_utf8_environment_value_reads_as_unset() {
    // SAFETY: the variable name is used by this test only.
    unsafe {
        std::env::set_var("INSTALLD_TEST_NON_UTF8", OsStr::from_bytes(b"/bin/\xff.sh"));
    }

    assert_eq!(env_lookup("INSTALLD_TEST_NON_UTF8"), None);

    let mut raw = ConfigBuilder::new().script("/from/file.sh").raw();
    apply_env_overrides(&mut raw, |name| {
        env_lookup(if name == "INSTALLER_SCRIPT" { "INSTALLD_TEST_NON_UTF8" } else { name })
    });
    assert_eq!(raw.installer.script, Some(PathBuf::from("/from/file.sh")));
}

#[test]
fn environment_overrides_file_values() {
    let mut raw = ConfigBuilder::new().script("/from/file.sh").raw();
    let vars = env(&[
        ("INSTALLER_SCRIPT", "/from/env.sh"),
        ("BACK_END_IP_ADDRESS", "10.0.0.2"),
        ("AUTO_INSTALL", "true"),
    ]);

    apply_env_overrides(&mut raw, |name| vars.get(name).cloned());

    assert_eq!(raw.installer.script, Some(PathBuf::from("/from/env.sh")));
    assert_eq!(raw.server.listen_address, "10.0.0.2");
    assert!(raw.installer.auto_install);
}

#[test]
fn auto_install_needs_exactly_true() {
    let mut raw = RawConfigFile::default();
    raw.installer.auto_install = true;
    let vars = env(&[("AUTO_INSTALL", "yes")]);

    apply_env_overrides(&mut raw, |name| vars.get(name).cloned());

    assert!(!raw.installer.auto_install);
}

#[test]
fn cli_flags_win_over_environment() -> TestResult {
    let mut raw = RawConfigFile::default();
    let vars = env(&[("INSTALLER_SCRIPT", "/from/env.sh"), ("BACK_END_IP_ADDRESS", "10.0.0.2")]);
    apply_env_overrides(&mut raw, |name| vars.get(name).cloned());

    let args = CliArgs::try_parse_from([
        "installd",
        "--installer",
        "/from/cli.sh",
        "--port",
        "8080",
        "--static-path",
        "/srv/ui",
        "--auto-install",
        "--log-level",
        "debug",
    ])?;
    args.apply_overrides(&mut raw);

    let cfg = ConfigFile::try_from(raw)?;
    assert_eq!(cfg.installer.script, PathBuf::from("/from/cli.sh"));
    assert_eq!(cfg.server.bind_address(), "10.0.0.2:8080");
    assert_eq!(cfg.server.static_path, PathBuf::from("/srv/ui"));
    assert!(cfg.installer.auto_install);
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    Ok(())
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration(" 5s "), Ok(Duration::from_secs(5)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("3d").is_err());
}

#[test]
fn log_level_resolution_order() {
    use tracing::Level;

    assert_eq!(resolve_level(Some(LogLevel::Warn), Some("trace")), Level::WARN);
    assert_eq!(resolve_level(None, Some("debug")), Level::DEBUG);
    assert_eq!(resolve_level(None, Some("chatty")), Level::INFO);
    assert_eq!(resolve_level(None, None), Level::INFO);
}

// src/exec/launch.rs

//! Spawning the installer with a single combined output stream.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::errors::{InstallerError, Result};

/// A freshly spawned installer.
///
/// `output` is the read end of one pipe that is both stdout and stderr of
/// the child, so the bytes arrive in exactly the order the process wrote
/// them.
#[derive(Debug)]
pub struct LaunchedInstaller {
    pub child: Child,
    pub output: pipe::Receiver,
    pub command: String,
    pub pid: Option<u32>,
}

/// Spawn `script` with `parameters` layered on top of the inherited
/// environment.
///
/// Every failure here is a [`InstallerError::LaunchFailure`]: nothing has
/// been started (or whatever was started is killed on drop).
pub fn launch_installer(
    script: &Path,
    parameters: &BTreeMap<String, String>,
) -> Result<LaunchedInstaller> {
    let launch_failure = |source: std::io::Error| InstallerError::LaunchFailure {
        script: script.to_path_buf(),
        source,
    };

    let (read_end, write_end) =
        pipe2(OFlag::O_CLOEXEC).map_err(|errno| launch_failure(errno.into()))?;
    let stderr_end = write_end.try_clone().map_err(launch_failure)?;

    let mut cmd = Command::new(script);
    cmd.envs(parameters)
        .stdin(Stdio::null())
        .stdout(Stdio::from(write_end))
        .stderr(Stdio::from(stderr_end))
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(launch_failure)?;

    // Our copies of the write end live in `cmd`; they must be gone for the
    // reader to see end-of-file when the child exits.
    drop(cmd);

    let output = pipe::Receiver::from_owned_fd(read_end).map_err(launch_failure)?;
    let pid = child.id();
    debug!(?pid, script = %script.display(), "installer process spawned");

    Ok(LaunchedInstaller {
        child,
        output,
        command: script.display().to_string(),
        pid,
    })
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which stream a frame on the live connection belongs to.
///
/// - `CmdOutput`: raw bytes from the installer's combined stdout/stderr.
///   Only these are kept in the output buffer and replayed.
/// - `Progress`: one line read from the progress side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamTag {
    CmdOutput,
    Progress,
}

impl StreamTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamTag::CmdOutput => "cmdOutput",
            StreamTag::Progress => "progress",
        }
    }
}

impl fmt::Display for StreamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible status of the installer run.
///
/// A cancelled run is reported as `Finished` with whatever code the OS gave
/// back (`-1` when the process died from a signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NotStarted,
    Running,
    Finished { code: i32 },
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunStatus::Finished { code } => Some(*code),
            _ => None,
        }
    }
}

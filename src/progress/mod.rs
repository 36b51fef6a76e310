// src/progress/mod.rs

//! Progress side channel.
//!
//! The installer reports structured progress by writing single lines to a
//! named pipe whose path it finds in its environment. [`ProgressChannel`]
//! creates that pipe, [`reader`] republishes its lines as `progress`
//! frames, and [`ProgressState`] remembers the most recent one.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tempfile::TempDir;
use tracing::debug;

use crate::errors::{InstallerError, Result};

pub mod reader;

pub use reader::{run_progress_reader, spawn_progress_reader};

/// A fifo in a private temporary directory.
///
/// The directory (and the fifo in it) is removed when this is dropped, so
/// keep it alive for as long as the service runs.
#[derive(Debug)]
pub struct ProgressChannel {
    _dir: TempDir,
    path: PathBuf,
}

impl ProgressChannel {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("installd-progress")
            .tempdir()?;
        let path = dir.path().join("fifo");

        mkfifo(path.as_path(), Mode::S_IRUSR | Mode::S_IWUSR).map_err(|errno| {
            InstallerError::SideChannel(format!("creating fifo {}: {errno}", path.display()))
        })?;
        debug!(path = %path.display(), "progress fifo created");

        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Last progress line seen on the side channel.
#[derive(Debug, Default)]
pub struct ProgressState {
    current: Mutex<Option<String>>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, line: impl Into<String>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(line.into());
    }

    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

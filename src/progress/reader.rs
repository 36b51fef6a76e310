// src/progress/reader.rs

//! Long-running reader loop for the progress fifo.
//!
//! The fifo is opened read-write. Holding a write end ourselves means the
//! installer closing its end (between runs, or between two `echo`s) never
//! shows up as end-of-file, and opening never blocks waiting for a writer.
//! Should the endpoint still end or fail, it is reopened; the loop only stops
//! on shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ProgressState;
use crate::broadcast::OutputRegistry;
use crate::errors::{InstallerError, Result};

/// Pause before retrying after the fifo could not be opened.
const REOPEN_DELAY: Duration = Duration::from_secs(1);

enum ReadEnd {
    Shutdown,
    Closed,
    Failed(std::io::Error),
}

pub fn spawn_progress_reader(
    path: PathBuf,
    registry: Arc<OutputRegistry>,
    state: Arc<ProgressState>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_progress_reader(path, registry, state, shutdown))
}

/// Read progress lines from `path` until `shutdown` turns true (or its
/// sender goes away).
pub async fn run_progress_reader(
    path: PathBuf,
    registry: Arc<OutputRegistry>,
    state: Arc<ProgressState>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(path = %path.display(), "reading progress from fifo");

    while !*shutdown.borrow() {
        let receiver = match open_endpoint(&path) {
            Ok(receiver) => receiver,
            Err(e) => {
                error!(error = %e, "failed to open progress fifo; retrying");
                tokio::select! {
                    _ = shutdown.wait_for(|stop| *stop) => break,
                    _ = tokio::time::sleep(REOPEN_DELAY) => continue,
                }
            }
        };

        match read_lines(receiver, &registry, &state, &mut shutdown).await {
            ReadEnd::Shutdown => break,
            ReadEnd::Closed => debug!("progress fifo reached end-of-file; reopening"),
            ReadEnd::Failed(e) => warn!(error = %e, "progress fifo read failed; reopening"),
        }
    }

    debug!("progress reader stopped");
}

fn open_endpoint(path: &Path) -> Result<pipe::Receiver> {
    pipe::OpenOptions::new()
        .read_write(true)
        .open_receiver(path)
        .map_err(|e| InstallerError::SideChannel(format!("opening {}: {e}", path.display())))
}

async fn read_lines(
    receiver: pipe::Receiver,
    registry: &OutputRegistry,
    state: &ProgressState,
    shutdown: &mut watch::Receiver<bool>,
) -> ReadEnd {
    let mut reader = BufReader::new(receiver);
    // Kept across iterations: `read_until` leaves partial data here if the
    // other branch wins.
    let mut buf = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => return ReadEnd::Shutdown,

            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => return ReadEnd::Closed,
                Ok(_) => {
                    if let Some(line) = take_line(&mut buf) {
                        info!(progress = %line, "current progress");
                        state.set(line.clone());
                        registry.publish_progress(line);
                    }
                }
                Err(e) => return ReadEnd::Failed(e),
            },
        }
    }
}

/// Drain `buf` into one line without its terminator. Invalid UTF-8 is
/// replaced rather than rejected so one bad line never costs the rest.
fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    buf.clear();
    (!line.is_empty()).then_some(line)
}

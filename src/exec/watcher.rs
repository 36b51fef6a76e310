// src/exec/watcher.rs

//! Termination watching for the installer process.

use std::time::Duration;

use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Wait until the installer exits and return its exit code.
///
/// If the cancel channel fires first the child is killed and we keep
/// waiting for the OS to report the exit; a killed process has no code and
/// is reported as `-1`, like any other abnormal termination.
///
/// The kill reaches the direct child only. Anything it forked that still
/// holds the output pipe keeps the pump alive, so the run is not finished
/// until `output_drain_timeout` expires.
pub(crate) async fn wait_for_exit(
    run_id: u64,
    child: &mut Child,
    mut cancel_rx: oneshot::Receiver<()>,
) -> i32 {
    debug!(run_id, "waiting for the installer to finish");

    let status = tokio::select! {
        status = child.wait() => status,

        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => {
                    info!(run_id, "cancellation requested; killing installer process");
                    if let Err(e) = child.start_kill() {
                        warn!(run_id, error = %e, "failed to kill installer process");
                    }
                }
                Err(_) => {
                    debug!(run_id, "cancel channel closed without explicit cancellation");
                }
            }
            child.wait().await
        }
    };

    match status {
        Ok(status) => {
            let code = status.code().unwrap_or(-1);
            if status.success() {
                info!(run_id, exit_code = code, "installer finished successfully");
            } else {
                error!(run_id, exit_code = code, "installer failed");
            }
            code
        }
        Err(e) => {
            error!(run_id, error = %e, "failed waiting for installer process");
            -1
        }
    }
}

/// Give the output pump up to `limit` to reach end-of-file.
///
/// A grandchild that inherited the output pipe can keep it open long after
/// the installer itself exited; in that case the pump is stopped.
pub(crate) async fn drain_output(run_id: u64, pump: JoinHandle<()>, limit: Duration) {
    let abort = pump.abort_handle();
    match tokio::time::timeout(limit, pump).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(run_id, error = %e, "output pump task failed"),
        Err(_) => {
            warn!(
                run_id,
                timeout = ?limit,
                "installer output still open after exit; stopping output pump"
            );
            abort.abort();
        }
    }
}

// src/exec/supervisor.rs

//! The installer supervisor.
//!
//! Owns the process handle, the run parameters and (through the registry)
//! the output buffer. Every operation takes the process lock, asks the pure
//! lifecycle core what to do, and carries out the answer while still holding
//! the lock, so concurrent callers always observe one consistent state.
//!
//! Lock order is process → parameters → registry; nothing takes them in the
//! other direction.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::broadcast::{FrameSink, OutputRegistry, Subscription};
use crate::engine::{LifecycleAction, LifecycleRequest, LifecycleState, decide};
use crate::errors::{InstallerError, Result};
use crate::types::RunStatus;

use super::launch::{LaunchedInstaller, launch_installer};
use super::output::pump_output;
use super::parameters::RunParameters;
use super::watcher::{drain_output, wait_for_exit};

/// Static settings for launching the installer.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Executable started for each run.
    pub script: PathBuf,
    /// How long to wait for trailing output after the process exited.
    pub output_drain_timeout: Duration,
}

/// Result of a clear request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Nothing was ever started (or it was already cleared).
    NothingToClear,
    /// The run was still going; termination has been requested instead.
    CancelRequested,
    /// Finished run dropped; a new start is allowed.
    Cleared,
}

/// Read-only view of the current run.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub status: RunStatus,
    pub run_id: Option<u64>,
    pub command: Option<String>,
    pub output: Bytes,
}

#[derive(Debug)]
struct ProcessHandle {
    run_id: u64,
    command: String,
    pid: Option<u32>,
    exit_code: Option<i32>,
    /// Taken by the first cancel; `None` afterwards.
    cancel: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    fn state(&self) -> LifecycleState {
        match self.exit_code {
            None => LifecycleState::Running,
            Some(_) => LifecycleState::Finished,
        }
    }

    fn status(&self) -> RunStatus {
        match self.exit_code {
            None => RunStatus::Running,
            Some(code) => RunStatus::Finished { code },
        }
    }

    fn request_termination(&mut self) {
        match self.cancel.take() {
            Some(tx) => {
                if tx.send(()).is_err() {
                    debug!(run_id = self.run_id, "installer already exited while cancelling");
                } else {
                    info!(run_id = self.run_id, pid = ?self.pid, "installer termination requested");
                }
            }
            None => debug!(run_id = self.run_id, "termination already requested"),
        }
    }
}

fn state_of(process: &Option<ProcessHandle>) -> LifecycleState {
    process
        .as_ref()
        .map_or(LifecycleState::Idle, ProcessHandle::state)
}

struct Shared {
    options: SupervisorOptions,
    process: Mutex<Option<ProcessHandle>>,
    parameters: Mutex<RunParameters>,
    registry: Arc<OutputRegistry>,
    last_run_id: AtomicU64,
}

impl Shared {
    fn lock_process(&self) -> MutexGuard<'_, Option<ProcessHandle>> {
        self.process.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_parameters(&self) -> MutexGuard<'_, RunParameters> {
        self.parameters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by the termination watcher once exit and output drain are done.
    fn finish(&self, run_id: u64, code: i32) {
        let mut process = self.lock_process();
        let Some(handle) = process.as_mut().filter(|h| h.run_id == run_id) else {
            debug!(run_id, "exit reported for a run that is no longer tracked");
            return;
        };

        if let Ok(LifecycleAction::RecordExit(code)) =
            decide(handle.state(), LifecycleRequest::Exited(code))
        {
            handle.exit_code = Some(code);
            handle.cancel = None;
            let closed = self.registry.close_all();
            debug!(run_id, exit_code = code, closed, "run finished; subscribers closed");
        }
    }
}

/// Cheaply cloneable handle to the single installer run.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("script", &self.shared.options.script)
            .field("state", &self.lifecycle_state())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(
        options: SupervisorOptions,
        parameters: RunParameters,
        registry: Arc<OutputRegistry>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                process: Mutex::new(None),
                parameters: Mutex::new(parameters),
                registry,
                last_run_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<OutputRegistry> {
        &self.shared.registry
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.shared.options
    }

    pub fn parameters(&self) -> RunParameters {
        self.shared.lock_parameters().clone()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        state_of(&self.shared.lock_process())
    }

    pub fn status(&self) -> RunStatus {
        self.shared
            .lock_process()
            .as_ref()
            .map_or(RunStatus::NotStarted, ProcessHandle::status)
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        let process = self.shared.lock_process();
        let output = self.shared.registry.output();
        match process.as_ref() {
            Some(handle) => ProcessSnapshot {
                status: handle.status(),
                run_id: Some(handle.run_id),
                command: Some(handle.command.clone()),
                output,
            },
            None => ProcessSnapshot {
                status: RunStatus::NotStarted,
                run_id: None,
                command: None,
                output,
            },
        }
    }

    /// Merge `overrides` into the run parameters and launch the installer.
    ///
    /// Returns the new run id. Fails with `AlreadyRunning` if a run exists
    /// that has not been cleared, and with `LaunchFailure` if the process
    /// could not be spawned; in both cases no process exists afterwards
    /// that did not exist before.
    pub fn start<I>(&self, overrides: I) -> Result<u64>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut process = self.shared.lock_process();
        let LifecycleAction::Launch = decide(state_of(&process), LifecycleRequest::Start)? else {
            return Err(InstallerError::AlreadyRunning);
        };

        let parameters = {
            let mut params = self.shared.lock_parameters();
            params.merge(overrides);
            params.snapshot()
        };

        let LaunchedInstaller {
            mut child,
            output,
            command,
            pid,
        } = launch_installer(&self.shared.options.script, &parameters)?;

        let run_id = self.shared.last_run_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(run_id, %command, ?pid, parameters = parameters.len(), "installer started");

        let (cancel_tx, cancel_rx) = oneshot::channel();
        *process = Some(ProcessHandle {
            run_id,
            command,
            pid,
            exit_code: None,
            cancel: Some(cancel_tx),
        });
        drop(process);

        let pump = tokio::spawn(pump_output(run_id, output, Arc::clone(&self.shared.registry)));

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let code = wait_for_exit(run_id, &mut child, cancel_rx).await;
            drain_output(run_id, pump, shared.options.output_drain_timeout).await;
            shared.finish(run_id, code);
        });

        Ok(run_id)
    }

    /// Request termination of the running installer without waiting for it.
    pub fn cancel(&self) -> Result<()> {
        let mut process = self.shared.lock_process();
        if let LifecycleAction::Terminate = decide(state_of(&process), LifecycleRequest::Cancel)? {
            if let Some(handle) = process.as_mut() {
                handle.request_termination();
            }
        }
        Ok(())
    }

    /// Drop a finished run; cancel a running one; ignore an idle supervisor.
    pub fn clear(&self) -> Result<ClearOutcome> {
        let mut process = self.shared.lock_process();
        let outcome = match decide(state_of(&process), LifecycleRequest::Clear)? {
            LifecycleAction::Terminate => {
                if let Some(handle) = process.as_mut() {
                    handle.request_termination();
                }
                ClearOutcome::CancelRequested
            }
            LifecycleAction::Reset => {
                if let Some(handle) = process.take() {
                    info!(run_id = handle.run_id, exit_code = ?handle.exit_code, "run cleared");
                }
                self.shared.registry.clear_output();
                ClearOutcome::Cleared
            }
            _ => ClearOutcome::NothingToClear,
        };
        Ok(outcome)
    }

    /// Register a live subscriber for the current (or next) run.
    ///
    /// The state is checked under the process lock: a run that already
    /// finished gets a replay and an immediate end-of-stream, anything else
    /// is registered and will be closed when the run ends.
    pub fn subscribe(&self, sink: Box<dyn FrameSink>) -> Subscription {
        let process = self.shared.lock_process();
        if state_of(&process) == LifecycleState::Finished {
            self.shared.registry.replay_and_close(sink)
        } else {
            self.shared.registry.subscribe(sink)
        }
    }
}

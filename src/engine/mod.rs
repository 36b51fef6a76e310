// src/engine/mod.rs

//! Lifecycle controller for the installer run.
//!
//! The state machine itself lives in [`core`] and is pure: it takes the
//! current [`LifecycleState`] plus a [`LifecycleRequest`] and answers with
//! the [`LifecycleAction`] the supervisor should carry out, or a rejection.
//! The supervisor (`exec::supervisor`) owns the state and performs the IO.

use std::fmt;

/// Externally visible lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No process since the last clear (or ever).
    Idle,
    /// Process launched and not yet observed to exit.
    Running,
    /// Process exited; output and exit code kept until cleared.
    Finished,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Running => "running",
            LifecycleState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Requests flowing into the state machine from callers and from the
/// termination watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleRequest {
    Start,
    Cancel,
    Clear,
    /// The OS reported the process exit with this code.
    Exited(i32),
}

/// What the supervisor must do in response to an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Spawn the installer with the current parameter snapshot.
    Launch,
    /// Ask the running process to terminate; state stays `Running`.
    Terminate,
    /// Drop process handle and output buffer; back to `Idle`.
    Reset,
    /// Store the exit code and close every subscriber; now `Finished`.
    RecordExit(i32),
    /// Accepted, nothing to do.
    Nothing,
}

pub mod core;

pub use self::core::{decide, next_state};

// src/engine/core.rs

//! Pure lifecycle transition table.
//!
//! No Tokio, no locks, no processes: this is the single source of truth for
//! which request is legal in which state, and is unit tested in isolation
//! (`tests/lifecycle_core.rs`).

use tracing::debug;

use super::{LifecycleAction, LifecycleRequest, LifecycleState};
use crate::errors::{InstallerError, Result};

/// Decide how to handle `request` in `state`.
///
/// | state    | Start          | Cancel     | Clear     | Exited(c)     |
/// |----------|----------------|------------|-----------|---------------|
/// | Idle     | Launch         | NotRunning | Nothing   | Nothing       |
/// | Running  | AlreadyRunning | Terminate  | Terminate | RecordExit(c) |
/// | Finished | AlreadyRunning | NotRunning | Reset     | Nothing       |
///
/// A start is refused until a finished run has been cleared, so output
/// and exit code of a run stay readable until someone explicitly drops them.
pub fn decide(state: LifecycleState, request: LifecycleRequest) -> Result<LifecycleAction> {
    use LifecycleAction as A;
    use LifecycleRequest as R;
    use LifecycleState as S;

    let action = match (state, request) {
        (S::Idle, R::Start) => A::Launch,
        (S::Running | S::Finished, R::Start) => return Err(InstallerError::AlreadyRunning),

        (S::Running, R::Cancel) => A::Terminate,
        (S::Idle | S::Finished, R::Cancel) => return Err(InstallerError::NotRunning),

        (S::Idle, R::Clear) => A::Nothing,
        (S::Running, R::Clear) => A::Terminate,
        (S::Finished, R::Clear) => A::Reset,

        (S::Running, R::Exited(code)) => A::RecordExit(code),
        (S::Idle | S::Finished, R::Exited(code)) => {
            // Stale exit from a run that is no longer tracked.
            debug!(%state, exit_code = code, "ignoring exit report outside of a running state");
            A::Nothing
        }
    };

    Ok(action)
}

/// State reached after `action` has been carried out from `state`.
pub fn next_state(state: LifecycleState, action: LifecycleAction) -> LifecycleState {
    match action {
        LifecycleAction::Launch => LifecycleState::Running,
        LifecycleAction::RecordExit(_) => LifecycleState::Finished,
        LifecycleAction::Reset => LifecycleState::Idle,
        LifecycleAction::Terminate | LifecycleAction::Nothing => state,
    }
}

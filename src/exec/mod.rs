// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs the installer with `tokio::process::Command` and feeds everything it
//! prints into the broadcast registry.
//!
//! - [`parameters`]: the run parameter set applied to the child environment.
//! - [`launch`]: spawning the child with stdout and stderr on one pipe.
//! - [`output`]: the pump copying that pipe into the registry.
//! - [`watcher`]: waiting for exit (or killing on cancel) and draining output.
//! - [`supervisor`]: the owning component exposing start / status / cancel /
//!   clear / subscribe.

pub mod launch;
pub mod output;
pub mod parameters;
pub mod supervisor;
pub mod watcher;

pub use parameters::{RunParameters, unicode_env};
pub use supervisor::{ClearOutcome, ProcessSnapshot, Supervisor, SupervisorOptions};

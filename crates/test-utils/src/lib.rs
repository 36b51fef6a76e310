pub mod builders;
pub mod recording_sink;

use std::sync::Once;
use std::time::Duration;

use installd::exec::Supervisor;
use installd::types::RunStatus;
use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{ConfigBuilder, supervisor_for, supervisor_with, write_script};
pub use recording_sink::{RecordingSink, SinkHandle};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll until the run has finished and return its exit code.
///
/// Wrap in [`with_timeout`]; this loops forever on a run that never ends.
pub async fn wait_until_finished(supervisor: &Supervisor) -> i32 {
    loop {
        if let RunStatus::Finished { code } = supervisor.status() {
            return code;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until `check` holds.
pub async fn wait_until<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    while !check() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

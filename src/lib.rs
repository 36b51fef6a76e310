// src/lib.rs

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod progress;
pub mod server;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::broadcast::OutputRegistry;
use crate::cli::CliArgs;
use crate::config::{ConfigFile, apply_env_overrides, env_lookup, load_raw};
use crate::exec::{RunParameters, Supervisor, unicode_env};
use crate::progress::{ProgressChannel, ProgressState, spawn_progress_reader};
use crate::server::{AppState, build_router};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file, environment, flags)
/// - the output registry and the supervisor
/// - the progress fifo and its reader
/// - the HTTP server
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let registry = Arc::new(OutputRegistry::new());
    let progress = Arc::new(ProgressState::new());

    let mut parameters =
        RunParameters::seed(&cfg.parameters, unicode_env(std::env::vars_os()));

    // Without the fifo the installer still runs; it just has nowhere to
    // report progress.
    let channel = match ProgressChannel::create() {
        Ok(channel) => {
            parameters.reserve(
                cfg.installer.progress_parameter.clone(),
                channel.path().display().to_string(),
            );
            Some(channel)
        }
        Err(e) => {
            warn!(error = %e, "progress side channel unavailable");
            None
        }
    };

    let reader = channel.as_ref().map(|channel| {
        spawn_progress_reader(
            channel.path().to_path_buf(),
            Arc::clone(&registry),
            Arc::clone(&progress),
            shutdown_rx.clone(),
        )
    });

    let supervisor = Supervisor::new(cfg.supervisor_options(), parameters, Arc::clone(&registry));

    // Ctrl-C → graceful shutdown.
    {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("shutdown requested");
            let _ = tx.send(true);
        });
    }

    let bind = cfg.server.bind_address();
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    if cfg.installer.auto_install {
        match supervisor.start(Vec::new()) {
            Ok(run_id) => info!(run_id, "auto-install started"),
            Err(e) => error!(error = %e, "auto-install failed"),
        }
    }

    let state = AppState::new(supervisor.clone(), progress, cfg.server.subscriber_queue);
    let router = build_router(state, &cfg.server.static_path);
    let served = server::serve(listener, router, shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    if supervisor.status().is_running() {
        info!("terminating installer before exit");
        let _ = supervisor.cancel();
    }
    if let Some(reader) = reader {
        if let Err(e) = reader.await {
            warn!(error = %e, "progress reader task failed");
        }
    }
    drop(channel);

    served
}

/// Config file (or defaults), then the process environment, then flags.
pub fn resolve_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut raw = load_raw(args.config.as_deref()).context("loading configuration")?;
    apply_env_overrides(&mut raw, env_lookup);
    args.apply_overrides(&mut raw);
    let cfg = ConfigFile::try_from(raw).context("validating configuration")?;
    Ok(cfg)
}

/// Simple dry-run output: print the resolved configuration.
fn print_dry_run(cfg: &ConfigFile) {
    println!("installd dry-run");
    println!("  server.bind = {}", cfg.server.bind_address());
    println!("  server.static_path = {}", cfg.server.static_path.display());
    println!("  server.subscriber_queue = {}", cfg.server.subscriber_queue);
    println!();

    println!("installer:");
    println!("  script: {}", cfg.installer.script.display());
    println!("  auto_install: {}", cfg.installer.auto_install);
    println!(
        "  output_drain_timeout: {:?}",
        cfg.installer.output_drain_timeout
    );
    println!("  progress_parameter: {}", cfg.installer.progress_parameter);
    println!();

    println!("parameters ({}):", cfg.parameters.len());
    for (name, value) in cfg.parameters.iter() {
        println!("  - {name} = {value}");
    }

    debug!("dry-run complete (no execution)");
}

// src/server/mod.rs

//! HTTP surface.
//!
//! Thin `axum` layer over [`Supervisor`]: every handler translates a
//! request into one supervisor operation and its result into a status
//! code. The live output stream (`/process_output`) lives in [`live`].

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{any, get, post};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

use crate::exec::Supervisor;
use crate::progress::ProgressState;

pub mod handlers;
pub mod live;

pub use handlers::ApiError;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub supervisor: Supervisor,
    pub progress: Arc<ProgressState>,
    /// Capacity of each live subscriber's frame queue.
    pub subscriber_queue: usize,
}

impl AppState {
    pub fn new(supervisor: Supervisor, progress: Arc<ProgressState>, subscriber_queue: usize) -> Self {
        Self {
            supervisor,
            progress,
            subscriber_queue: subscriber_queue.max(1),
        }
    }
}

/// Build the router: API routes first, static files for everything else.
pub fn build_router(state: AppState, static_path: &Path) -> Router {
    Router::new()
        .route("/install", post(handlers::install))
        .route("/clear", any(handlers::clear))
        .route("/cancel", any(handlers::cancel))
        .route("/process_status", get(handlers::process_status))
        .route("/download_log", get(handlers::download_log))
        .route("/progress", get(handlers::progress))
        .route("/process_output", get(live::process_output))
        .fallback_service(ServeDir::new(static_path))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let local = listener.local_addr().context("reading listener address")?;
    info!(address = %local, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            // A dropped sender also means shutdown.
            let _ = shutdown.wait_for(|stop| *stop).await;
            info!("http server shutting down");
        })
        .await
        .context("http server failed")
}

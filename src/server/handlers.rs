// src/server/handlers.rs

use std::collections::HashSet;

use axum::Json;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::errors::InstallerError;
use crate::exec::ClearOutcome;
use crate::types::RunStatus;

/// Error side of every handler.
#[derive(Debug)]
pub enum ApiError {
    Installer(InstallerError),
    /// The install form could not be read.
    BadForm(String),
    /// Status was queried before any run was started.
    NotStarted,
}

impl From<InstallerError> for ApiError {
    fn from(err: InstallerError) -> Self {
        ApiError::Installer(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Installer(InstallerError::AlreadyRunning) => {
                (StatusCode::CONFLICT, "already running".to_string())
            }
            ApiError::Installer(InstallerError::NotRunning) => {
                (StatusCode::CONFLICT, "no running process".to_string())
            }
            ApiError::Installer(err) => {
                error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::BadForm(reason) => {
                warn!(%reason, "failed to parse form");
                (StatusCode::BAD_REQUEST, "failed to parse form".to_string())
            }
            ApiError::NotStarted => (StatusCode::NOT_FOUND, "no running process".to_string()),
        };
        (status, message).into_response()
    }
}

/// `POST /install`: merge the form fields into the run parameters and
/// start the installer.
pub async fn install(State(state): State<AppState>, request: Request) -> Result<StatusCode, ApiError> {
    let fields = read_form(request).await?;
    for (key, value) in &fields {
        debug!(%key, %value, "install form value");
    }

    let run_id = state.supervisor.start(fields)?;
    info!(run_id, "install requested");
    Ok(StatusCode::OK)
}

/// Accepts `application/x-www-form-urlencoded` and `multipart/form-data`.
/// Only the first value of a repeated field is kept.
async fn read_form(request: Request) -> Result<Vec<(String, String)>, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let fields = if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadForm(e.body_text()))?;
        fields
    } else if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadForm(e.body_text()))?;

        let mut fields = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadForm(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadForm(e.body_text()))?;
            fields.push((name, value));
        }
        fields
    } else {
        return Err(ApiError::BadForm(format!(
            "unsupported content type '{content_type}'"
        )));
    };

    let mut seen = HashSet::new();
    Ok(fields
        .into_iter()
        .filter(|(name, _)| seen.insert(name.clone()))
        .collect())
}

/// `/clear`: drop a finished run, or cancel a running one.
pub async fn clear(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    match state.supervisor.clear()? {
        ClearOutcome::Cleared => info!("run cleared"),
        ClearOutcome::CancelRequested => info!("clear requested while running; cancelling"),
        ClearOutcome::NothingToClear => debug!("clear requested with nothing to clear"),
    }
    Ok(StatusCode::OK)
}

/// `/cancel`
pub async fn cancel(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.supervisor.cancel()?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Serialize)]
pub struct ProcessStatusBody {
    pub status: &'static str,
    pub output: String,
    pub return_code: i32,
    pub command: String,
    pub progress: Option<String>,
}

/// `GET /process_status`
pub async fn process_status(State(state): State<AppState>) -> Result<Json<ProcessStatusBody>, ApiError> {
    let snapshot = state.supervisor.snapshot();
    let (status, return_code) = match snapshot.status {
        RunStatus::NotStarted => return Err(ApiError::NotStarted),
        RunStatus::Running => ("RUNNING", -1),
        RunStatus::Finished { code } => ("FINISHED", code),
    };

    Ok(Json(ProcessStatusBody {
        status,
        output: String::from_utf8_lossy(&snapshot.output).into_owned(),
        return_code,
        command: snapshot.command.unwrap_or_default(),
        progress: state.progress.current(),
    }))
}

/// `GET /download_log`: the buffered output as an attachment.
pub async fn download_log(State(state): State<AppState>) -> impl IntoResponse {
    (
        [
            (CONTENT_TYPE, "text/plain;charset=UTF-8"),
            (CONTENT_DISPOSITION, "attachment;filename=installer.log"),
        ],
        state.supervisor.registry().output(),
    )
}

#[derive(Debug, Serialize)]
pub struct ProgressBody {
    pub progress: Option<String>,
}

/// `GET /progress`
pub async fn progress(State(state): State<AppState>) -> Json<ProgressBody> {
    Json(ProgressBody {
        progress: state.progress.current(),
    })
}

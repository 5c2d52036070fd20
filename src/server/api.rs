use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use finrouter_common::Identity;
use serde::{Deserialize, Serialize};

use crate::capabilities::Artifacts;
use crate::errors::RunError;
use crate::orchestrator::{Orchestrator, RunRequest};
use crate::uploads::UploadStore;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub uploads: UploadStore,
}

pub type SharedState = Arc<AppState>;

// ── Request / response types ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub user_id: String,
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub response: String,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::NoFinalResponse => ApiError::Internal("Graph did not produce a final response.".into()),
            other => ApiError::Internal(format!("Graph execution error: {}", other)),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/invoke", post(invoke))
        .route("/invoke_with_files", post(invoke_with_files))
        .route("/threads/{thread_id}/checkpoint", get(latest_checkpoint))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn invoke(
    State(state): State<SharedState>,
    Json(req): Json<InvokeRequest>,
) -> Result<Json<InvokeResponse>, ApiError> {
    let request = RunRequest::new(req.message, Identity::new(req.user_id, req.session_id));
    let report = state.orchestrator.handle(request).await?;
    Ok(Json(InvokeResponse {
        response: report.response,
    }))
}

async fn invoke_with_files(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<InvokeResponse>, ApiError> {
    let mut user_id = None;
    let mut session_id = None;
    let mut message = None;
    let mut artifacts = Artifacts::default();
    let mut file_count = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(filename) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file {}: {}", filename, e)))?;
            state
                .uploads
                .attach(&mut artifacts, &filename, content_type.as_deref(), &bytes)
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            file_count += 1;
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
        match name.as_str() {
            "user_id" => user_id = Some(value),
            "session_id" => session_id = Some(value),
            "message" => message = Some(value),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    if file_count == 0 {
        return Err(ApiError::BadRequest("No files were provided.".into()));
    }
    let missing = |field: &str| ApiError::BadRequest(format!("Missing form field: {}", field));
    let user_id = user_id.ok_or_else(|| missing("user_id"))?;
    let session_id = session_id.ok_or_else(|| missing("session_id"))?;
    let message = message.ok_or_else(|| missing("message"))?;

    let request = RunRequest::new(message, Identity::new(user_id, session_id)).with_artifacts(artifacts);
    let report = state.orchestrator.handle(request).await?;
    Ok(Json(InvokeResponse {
        response: report.response,
    }))
}

async fn latest_checkpoint(
    State(state): State<SharedState>,
    Path(thread_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let checkpoints = state
        .orchestrator
        .checkpoints()
        .ok_or_else(|| ApiError::NotFound("Checkpoints are disabled".into()))?;
    let checkpoint = checkpoints
        .latest_for_thread(&thread_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("No checkpoint for thread {}", thread_id)))?;
    Ok(Json(checkpoint))
}

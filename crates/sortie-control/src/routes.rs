use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use sortie_agent::{LifecyclePhase, UploadError};
use sortie_agent::support::format_error_chain;

use crate::audit;
use crate::auth::{self, AuthUser};
use crate::security::{self, RequestMeta, json_error};
use crate::state::AppState;

/// Multipart framing on top of the mission payload.
const UPLOAD_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthzResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn start_server(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    match state.supervisor.start().await {
        Ok(()) => {
            audit::record(&meta, &user, "started", "DCS server");
            message("DCS server started successfully").into_response()
        }
        Err(e) => {
            let detail = format_error_chain(&e);
            tracing::error!(request_id = %meta.request_id, error = %detail, "start failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to start DCS server: {detail}"),
            )
        }
    }
}

pub async fn stop_server(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    match state.supervisor.stop().await {
        Ok(()) => {
            audit::record(&meta, &user, "stopped", "DCS server");
            message("DCS server stopped successfully").into_response()
        }
        Err(e) => {
            let detail = format_error_chain(&e);
            tracing::error!(request_id = %meta.request_id, error = %detail, "stop failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to stop DCS server: {detail}"),
            )
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub phase: LifecyclePhase,
    pub uptime: String,
    pub allowed_filenames: Vec<String>,
    pub allowed_max_size: u64,
}

pub async fn server_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.supervisor.status();
    let phase = state.supervisor.phase();
    let missions = state.supervisor.missions();
    Json(StatusResponse {
        status: if status.running { "running" } else { "stopped" },
        phase,
        uptime: status.uptime_display(),
        allowed_filenames: missions.allowed_filenames().to_vec(),
        allowed_max_size: missions.max_size(),
    })
}

pub async fn upload_mission(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return json_error(StatusCode::BAD_REQUEST, "missing 'file' field"),
            Err(e) => return json_error(e.status(), e.body_text()),
        };
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => return json_error(e.status(), e.body_text()),
        };

        return match state.supervisor.save_mission(&bytes, &filename).await {
            Ok(_) => {
                audit::record(&meta, &user, "uploaded", &filename);
                message(format!("File '{filename}' uploaded successfully")).into_response()
            }
            Err(e) => upload_error(&meta, e),
        };
    }
}

/// HTTP status for a failed upload. A locked mission file is a 403.
pub fn upload_error_status(e: &UploadError) -> StatusCode {
    match e {
        UploadError::RejectedFilename(_) => StatusCode::BAD_REQUEST,
        UploadError::RejectedSize { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        UploadError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        UploadError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn upload_error(meta: &RequestMeta, e: UploadError) -> Response {
    let code = upload_error_status(&e);
    if code.is_server_error() {
        tracing::error!(request_id = %meta.request_id, error = %format_error_chain(&e), "upload failed");
    } else {
        tracing::warn!(request_id = %meta.request_id, error = %e, "upload rejected");
    }
    json_error(code, e.to_string())
}

pub async fn download_state(State(state): State<AppState>) -> Response {
    // Absent right after a start until the mission exports; not an error.
    let path = match state.supervisor.state_file() {
        Ok(p) => p,
        Err(_) => return json_error(StatusCode::NOT_FOUND, "state.json file not found"),
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"state.json\""),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            json_error(StatusCode::NOT_FOUND, "state.json file not found")
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read state.json");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to read state.json")
        }
    }
}

pub fn router(state: AppState) -> Router {
    let max_upload = usize::try_from(state.supervisor.missions().max_size())
        .unwrap_or(usize::MAX)
        .saturating_add(UPLOAD_OVERHEAD);

    let api = Router::new()
        .route("/auth/validate", get(auth::validate))
        .route("/server/start", post(start_server))
        .route("/server/stop", post(stop_server))
        .route("/status", get(server_status))
        .route(
            "/files/upload_miz",
            post(upload_mission).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/files/state.json", get(download_state))
        .layer(middleware::from_fn_with_state(state.clone(), auth::basic_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(security::request_id))
        .with_state(state)
}

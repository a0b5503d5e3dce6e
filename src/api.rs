use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, Json, Multipart, Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    app_state::{AppState, ReportSession},
    config::AppMode,
    error::ReportError,
    intake,
    models::{ConversationTurn, Notice},
    report,
};

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct AskPayload {
    question: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    session: ReportSession,
}

#[derive(Serialize)]
pub struct AskResponse {
    #[serde(flatten)]
    turn: ConversationTurn,
}

type ApiError = (StatusCode, Json<Notice>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Traduce el error de dominio a código HTTP + aviso para el frontend.
pub fn error_response(err: &ReportError) -> ApiError {
    let status = match err {
        ReportError::NoSummary => StatusCode::CONFLICT,
        ReportError::EmptyQuestion | ReportError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ReportError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ReportError::NotPdf { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ReportError::EmptyDocument(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReportError::UploadsDisabled => StatusCode::FORBIDDEN,
        ReportError::FileNotFound { .. } | ReportError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ReportError::MissingApiKey => StatusCode::SERVICE_UNAVAILABLE,
        ReportError::Remote(_) => StatusCode::BAD_GATEWAY,
        ReportError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let notice = if err.is_warning() {
        Notice::warning(err.to_string())
    } else {
        Notice::error(err.to_string())
    };
    (status, Json(notice))
}

// Los rechazos de los extractores de axum se devuelven como texto plano;
// aquí se convierten en el mismo aviso `{level, message}` que el resto.

fn session_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| error_response(&ReportError::BadRequest(e.body_text())))
}

fn multipart_error(err: MultipartError, limit_bytes: usize) -> ReportError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ReportError::PayloadTooLarge {
            limit_mb: limit_bytes / (1024 * 1024),
        }
    } else {
        ReportError::BadRequest(err.body_text())
    }
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.max_upload_bytes;
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:id", get(get_session_handler))
        .route("/api/sessions/:id/upload", post(upload_handler))
        .route("/api/sessions/:id/ask", post(ask_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}

// --- Handlers ---

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "mode": state.mode.label(),
        "model": state.llm_manager.model_name,
        "api_key_configured": state.llm_manager.is_configured(),
        "uploads_enabled": state.mode == AppMode::Upload,
        "summary_loaded": state.static_summary.is_some(),
        "notice": state.startup_notice,
        "sessions": state.sessions.len(),
    }))
}

async fn create_session_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionResponse>) {
    let notice = match (&state.mode, &state.static_summary) {
        (AppMode::Static { .. }, Some(_)) => Notice::success("Resumen del informe cargado."),
        _ => state.startup_notice.clone(),
    };
    let session = state.sessions.create(state.static_summary.clone(), notice);
    info!("Sesión {} creada", session.id);
    (StatusCode::CREATED, Json(SessionResponse { session }))
}

async fn get_session_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<SessionResponse> {
    let id = session_id(path)?;
    state
        .sessions
        .get(&id)
        .map(|session| Json(SessionResponse { session }))
        .ok_or_else(|| error_response(&ReportError::SessionNotFound(id.to_string())))
}

#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<SessionResponse> {
    let id = session_id(path)?;
    let result = match multipart {
        Ok(multipart) => upload_and_summarize(&state, &id, multipart).await,
        Err(rejection) => Err(ReportError::BadRequest(rejection.body_text())),
    };
    match result {
        Ok(session) => Ok(Json(SessionResponse { session })),
        Err(err) => {
            error!("Sesión {}: error en la subida: {}", id, err);
            let (status, Json(notice)) = error_response(&err);
            state.sessions.set_status(&id, notice.clone());
            Err((status, Json(notice)))
        }
    }
}

async fn upload_and_summarize(
    state: &AppState,
    id: &Uuid,
    mut multipart: Multipart,
) -> Result<ReportSession, ReportError> {
    if state.mode != AppMode::Upload {
        return Err(ReportError::UploadsDisabled);
    }
    if state.sessions.get(id).is_none() {
        return Err(ReportError::SessionNotFound(id.to_string()));
    }
    // Sin clave no se guarda nada: el resumen fallaría de todas formas.
    state.llm_manager.model()?;

    let limit = state.config.max_upload_bytes;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit))?;
        upload = Some((name, bytes));
        break;
    }
    let (name, bytes) =
        upload.ok_or_else(|| ReportError::BadRequest("falta el campo 'file'".to_string()))?;

    let document =
        intake::store_upload(&state.config.upload_dir, &name, &bytes, Utc::now()).await?;
    let summary = report::summarize_report(&state.llm_manager, &document.path).await?;

    let notice = Notice::success(format!("Informe '{}' resumido.", document.original_name));
    state
        .sessions
        .set_summarized(id, document, summary, notice)
        .ok_or_else(|| ReportError::SessionNotFound(id.to_string()))
}

#[axum::debug_handler]
async fn ask_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AskPayload>, JsonRejection>,
) -> ApiResult<AskResponse> {
    let id = session_id(path)?;
    let Json(payload) =
        payload.map_err(|e| error_response(&ReportError::BadRequest(e.body_text())))?;
    let summary = state
        .sessions
        .summary(&id)
        .ok_or_else(|| error_response(&ReportError::SessionNotFound(id.to_string())))?;

    match report::answer_question(&state.llm_manager, summary.as_ref(), &payload.question).await {
        Ok(turn) => Ok(Json(AskResponse { turn })),
        Err(err) => {
            if err.is_warning() {
                warn!("Sesión {}: {}", id, err);
            } else {
                error!("Sesión {}: error respondiendo: {}", id, err);
            }
            let (status, Json(notice)) = error_response(&err);
            state.sessions.set_status(&id, notice.clone());
            Err((status, Json(notice)))
        }
    }
}

//! HTTP server and browser UI.
//!
//! Serves the single-page demo UI and a small JSON API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Embedded browser UI |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/upload` | Multipart upload; stores the file, returns its path |
//! | `POST` | `/api/ingest` | Parse + embed + index the file at a path |
//! | `POST` | `/api/chat` | Ask a question; answer streamed as SSE |
//! | `POST` | `/api/reset` | Drop the index and clear the UI state |
//!
//! Error responses use the schema
//! `{ "error": { "code": "...", "message": "..." } }` with codes
//! `bad_request` (400), `upstream_error` (502), and `internal` (500).
//! Validation outcomes the user is meant to read (missing path, unsupported
//! extension, no index yet) are **not** errors: they are 200 responses whose
//! body carries the status text.
//!
//! CORS permits all origins, methods, and headers so the page can be served
//! from elsewhere during development.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{Config, Credentials};
use crate::engine::{single_message_stream, QueryEngine, NO_INDEX_MESSAGE};
use crate::index::{new_shared, SharedIndex};
use crate::ingest::ingest_file;
use crate::models::ChatMessage;

/// Shared application state passed to all route handlers.
///
/// The index lives here — not in a global — so every handler receives its
/// ownership path explicitly and concurrent sessions contend only on the
/// lock.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    credentials: Arc<Credentials>,
    index: SharedIndex,
}

impl AppState {
    pub fn new(config: Config, credentials: Credentials) -> Self {
        Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            index: new_shared(),
        }
    }
}

/// Start the demo server on the configured bind address.
pub async fn run_server(config: &Config, credentials: Credentials) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.uploads.dir).await?;

    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config.clone(), credentials);
    let app = build_router(state);

    println!("Document Q&A listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router; split out from [`run_server`] so tests can drive it
/// without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_ui))
        .route("/health", get(handle_health))
        .route("/api/upload", post(handle_upload))
        .route("/api/ingest", post(handle_ingest))
        .route("/api/chat", post(handle_chat))
        .route("/api/reset", post(handle_reset))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// 502 for failures of the external parse/embed/model services.
fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET / ============

async fn handle_ui() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/upload ============

#[derive(Serialize)]
struct UploadResponse {
    path: String,
}

/// Store a multipart upload under the uploads directory and return the
/// server-side path for a later `/api/ingest` call.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        // Basename only: the client must not choose where the file lands.
        let file_name = field
            .file_name()
            .and_then(|n| Path::new(n).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.to_string()))?;

        tokio::fs::create_dir_all(&state.config.uploads.dir)
            .await
            .map_err(|e| internal_error(e.to_string()))?;
        let dest = state.config.uploads.dir.join(&file_name);
        tokio::fs::write(&dest, &data)
            .await
            .map_err(|e| internal_error(e.to_string()))?;

        return Ok(Json(UploadResponse {
            path: dest.display().to_string(),
        }));
    }

    Err(bad_request("multipart field 'file' is required"))
}

// ============ POST /api/ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    path: Option<String>,
}

#[derive(Serialize)]
struct IngestResponse {
    status: String,
}

/// Run the ingestion pipeline for the file at `path`.
///
/// Validation outcomes come back as 200s with the status text; failures of
/// the external parse/embed services come back as `upstream_error`.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let status = ingest_file(
        &state.config,
        &state.credentials,
        &state.index,
        req.path.as_deref(),
    )
    .await
    .map_err(|e| upstream_error(format!("{:#}", e)))?;

    Ok(Json(IngestResponse { status }))
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    /// Accepted for interface compatibility; the engine does not use it.
    #[serde(default)]
    #[allow(dead_code)]
    history: Vec<ChatMessage>,
}

/// Answer a question as an SSE stream.
///
/// Each event carries the full accumulated answer so far. With no index
/// present, the stream is a single "upload a file first" event and no
/// external service is contacted.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Snapshot under the read lock; never hold the lock across awaits.
    let snapshot = state.index.read().unwrap().clone();

    let stream = match snapshot {
        None => single_message_stream(NO_INDEX_MESSAGE),
        Some(index) => {
            let engine = QueryEngine::new(
                state.config.as_ref().clone(),
                state.credentials.as_ref().clone(),
                index,
            );
            engine.answer(req.message)
        }
    };

    Sse::new(stream.map(|text| Ok::<_, Infallible>(Event::default().data(text))))
        .keep_alive(KeepAlive::default())
}

// ============ POST /api/reset ============

#[derive(Serialize)]
struct ResetResponse {
    /// Cleared file-upload control.
    file: Option<String>,
    /// Cleared status display.
    status: String,
    /// Cleared conversation display.
    conversation: Vec<ChatMessage>,
}

/// Drop the index and return empty values for the UI controls.
async fn handle_reset(State(state): State<AppState>) -> Json<ResetResponse> {
    *state.index.write().unwrap() = None;

    Json(ResetResponse {
        file: None,
        status: String::new(),
        conversation: Vec::new(),
    })
}

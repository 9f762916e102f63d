
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::ingestion::is_supported;
use crate::pipeline::RagPipeline;
use crate::{RagError, Result};

const INDEX_HTML: &str = include_str!("index.html");

/// Shared state for the web handlers
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
    uploads_dir: PathBuf,
}

impl AppState {
    #[inline]
    pub fn new(pipeline: RagPipeline, uploads_dir: PathBuf) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            uploads_dir,
        }
    }
}

/// One exchange shown in the chat tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Earlier turns; displayed by the page, not sent to the model
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub files: Vec<String>,
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnsupportedFormat(_) | Self::Document(_) | Self::Config(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router for the chat page and its API
#[inline]
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .route(
            "/api/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until the process is stopped
#[inline]
pub async fn serve(config: &Config, pipeline: RagPipeline) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| RagError::Config(format!("Invalid address: {}", e)))?;

    let uploads_dir = config.uploads_dir();
    tokio::fs::create_dir_all(&uploads_dir).await?;

    let app = router(
        AppState::new(pipeline, uploads_dir),
        config.server.max_upload_bytes,
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RagError::Network(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Serving chat UI on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    info!(
        "Chat message received ({} earlier turns)",
        request.history.len()
    );
    let answer = state.pipeline.chat(&request.message).await?;
    Ok(Json(ChatResponse { answer }))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RagError::Document(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        if !is_supported(Path::new(&file_name)) {
            return Err(RagError::UnsupportedFormat(file_name));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| RagError::Document(format!("Failed to read {}: {}", file_name, e)))?;
        files.push((file_name, data));
    }

    // Nothing touches the uploads directory until every part has been accepted.
    let mut names = Vec::with_capacity(files.len());
    let mut saved = Vec::with_capacity(files.len());
    if !files.is_empty() {
        tokio::fs::create_dir_all(&state.uploads_dir).await?;
    }
    for (file_name, data) in files {
        let path = state
            .uploads_dir
            .join(format!("{}_{}", Uuid::new_v4(), sanitize_file_name(&file_name)));
        if let Err(e) = tokio::fs::write(&path, &data).await {
            remove_files(&saved).await;
            return Err(e.into());
        }

        info!("Received {} ({} bytes)", file_name, data.len());
        names.push(file_name);
        saved.push(path);
    }

    state.pipeline.upload(&saved).await?;
    Ok(Json(UploadResponse { files: names }))
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Keep only the final path component, restricted to a safe character set
#[inline]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload.pdf".to_string()
    } else {
        cleaned
    }
}

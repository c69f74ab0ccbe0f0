//! HTTP surface: three upload endpoints and a health check.
//!
//! | Method | Path | Result |
//! |--------|------|--------|
//! | POST | `/analyser/` | [`StudyMaterial`] |
//! | POST | `/generate-quiz/` | [`BasicQuiz`] |
//! | POST | `/generate-graded-quiz/` | [`GradedQuiz`] |
//! | GET  | `/health` | `{"status":"ok"}` |
//!
//! Uploads are `multipart/form-data` with the document in a field named
//! `file`. Only the task result is returned; [`crate::output::RunStats`] goes
//! to the logs.
//!
//! An unsupported extension answers **200** with
//! `{"error": "Format de fichier non supporté"}`; existing front-ends rely on
//! that status. Every other failure carries a 4xx/5xx status and the same
//! `{"error": …}` body.

use crate::config::StudyConfig;
use crate::error::{StudyError, UNSUPPORTED_FORMAT_MESSAGE};
use crate::output::{BasicQuiz, GradedQuiz, StudyMaterial, TaskResult};
use crate::pipeline::llm::ModelClient;
use crate::study::run_task;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Multipart field carrying the document.
pub const UPLOAD_FIELD: &str = "file";

/// Origins allowed when `STUDY_ALLOWED_ORIGINS` is unset.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] =
    &["http://localhost:3000", "https://revision-tool-mu.vercel.app"];

/// Upload size limit when `STUDY_MAX_UPLOAD_BYTES` is unset (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// ── Configuration ────────────────────────────────────────────────────────

/// Listener and HTTP-layer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Exact origins allowed by CORS; credentials are allowed for them.
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Read `STUDY_BIND`, `STUDY_PORT`, `STUDY_ALLOWED_ORIGINS` and
    /// `STUDY_MAX_UPLOAD_BYTES`; unset or empty variables keep their default.
    pub fn from_env() -> Result<Self, StudyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StudyError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(bind) = get("STUDY_BIND") {
            config.bind = bind.trim().to_string();
        }
        if let Some(port) = get("STUDY_PORT") {
            config.port = port.trim().parse().map_err(|_| {
                StudyError::InvalidConfig(format!("STUDY_PORT must be a port number, got '{}'", port))
            })?;
        }
        if let Some(origins) = get("STUDY_ALLOWED_ORIGINS") {
            config.allowed_origins = parse_origins(&origins);
        }
        if let Some(limit) = get("STUDY_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit.trim().parse().map_err(|_| {
                StudyError::InvalidConfig(format!(
                    "STUDY_MAX_UPLOAD_BYTES must be a byte count, got '{}'",
                    limit
                ))
            })?;
        }
        Ok(config)
    }

    /// `bind:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", o);
                    None
                }
            })
            .collect();

        // Wildcards are not allowed together with credentials, so methods and
        // headers mirror the preflight request instead.
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}

/// Split a comma-separated origin list; trailing slashes are dropped since
/// browsers never send them in `Origin`.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

// ── State and router ─────────────────────────────────────────────────────

/// Shared by every request.
pub struct AppState {
    pub client: Arc<dyn ModelClient>,
    pub config: StudyConfig,
}

/// Build the router with CORS, request tracing and the upload limit applied.
pub fn build_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    Router::new()
        .route("/analyser/", post(analyser))
        .route("/analyser", post(analyser))
        .route("/generate-quiz/", post(generate_quiz))
        .route("/generate-quiz", post(generate_quiz))
        .route("/generate-graded-quiz/", post(generate_graded_quiz))
        .route("/generate-graded-quiz", post(generate_graded_quiz))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(server.max_upload_bytes))
        .layer(server.cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: Arc<AppState>, server: ServerConfig) -> std::io::Result<()> {
    let app = build_router(state, &server);
    let addr = server.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, origins = ?server.allowed_origins, "HTTP API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// POST /analyser/ — summary, questions and revision cards.
async fn analyser(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<StudyMaterial>, ApiError> {
    handle(state, multipart).await
}

/// POST /generate-quiz/ — basic quiz.
async fn generate_quiz(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<BasicQuiz>, ApiError> {
    handle(state, multipart).await
}

/// POST /generate-graded-quiz/ — multiple-choice quiz.
async fn generate_graded_quiz(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<GradedQuiz>, ApiError> {
    handle(state, multipart).await
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle<T: TaskResult>(
    state: Arc<AppState>,
    multipart: Multipart,
) -> Result<Json<T>, ApiError> {
    let (filename, bytes) = read_upload(multipart).await?;
    let output = run_task::<T>(&filename, bytes, state.client.as_ref(), &state.config).await?;
    Ok(Json(output.result))
}

/// Pull the `file` field out of the form; other fields are ignored.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(ApiError::MissingFile)
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    MissingFile,
    Multipart(MultipartError),
    Study(StudyError),
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

impl From<StudyError> for ApiError {
    fn from(e: StudyError) -> Self {
        ApiError::Study(e)
    }
}

impl ApiError {
    /// Status code and client-facing message.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::MissingFile => (
                StatusCode::BAD_REQUEST,
                format!("Champ '{}' manquant dans le formulaire", UPLOAD_FIELD),
            ),
            ApiError::Multipart(e) => (e.status(), e.body_text()),
            ApiError::Study(e) => match e {
                StudyError::UnsupportedFormat { .. } => {
                    (StatusCode::OK, UNSUPPORTED_FORMAT_MESSAGE.to_string())
                }
                e if e.is_client_error() => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
                e if e.is_transient() => (StatusCode::BAD_GATEWAY, e.to_string()),
                e => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", message);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DocumentFormat;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_defaults_when_env_is_empty() {
        let c = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c, ServerConfig::default());
        assert_eq!(c.addr(), "127.0.0.1:8000");
        assert_eq!(c.max_upload_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn config_reads_overrides() {
        let c = ServerConfig::from_lookup(lookup(&[
            ("STUDY_BIND", "0.0.0.0"),
            ("STUDY_PORT", "9000"),
            ("STUDY_ALLOWED_ORIGINS", "https://a.example/, https://b.example"),
            ("STUDY_MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(c.addr(), "0.0.0.0:9000");
        assert_eq!(c.allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(c.max_upload_bytes, 1024);
    }

    #[test]
    fn config_rejects_bad_numbers() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("STUDY_PORT", "http")])),
            Err(StudyError::InvalidConfig(_))
        ));
        assert!(ServerConfig::from_lookup(lookup(&[("STUDY_MAX_UPLOAD_BYTES", "-1")])).is_err());
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (
                ApiError::Study(StudyError::UnsupportedFormat {
                    filename: "notes.txt".into(),
                }),
                StatusCode::OK,
            ),
            (ApiError::MissingFile, StatusCode::BAD_REQUEST),
            (
                ApiError::Study(StudyError::CorruptDocument {
                    format: DocumentFormat::Pdf,
                    detail: "bad xref".into(),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Study(StudyError::ModelTimeout { secs: 120 }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Study(StudyError::ModelCallFailed {
                    transient: false,
                    attempts: 1,
                    detail: "401".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_message().0, expected, "{err:?}");
        }
    }

    #[test]
    fn unsupported_format_message_is_exact() {
        let err = ApiError::Study(StudyError::UnsupportedFormat {
            filename: "notes.txt".into(),
        });
        assert_eq!(err.status_and_message().1, "Format de fichier non supporté");
    }
}

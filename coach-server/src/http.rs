//! Interview coach HTTP API
//!
//! Axum server in front of the analysis pipeline. Each endpoint has a thin
//! axum handler that delegates to an inner function; the inner functions are
//! callable from tests without going through the router.
//!
//! Endpoints:
//! - GET     /         liveness probe with docs URL
//! - GET     /docs     endpoint index
//! - GET     /health   database probe and version
//! - OPTIONS /analyze  CORS preflight
//! - POST    /analyze  multipart `file` + `question`, returns the analysis
//! - GET     /history  every recorded interview, newest first

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use coach_core::{AnalysisError, AnalysisResult, CoachConfig, GenerativeBackend};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::subsystems::analyze::{self, AnalysisSettings};
use crate::subsystems::history;
use crate::subsystems::upload::AudioArtifact;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: SqlitePool,
    pub config: CoachConfig,
    pub backend: Arc<dyn GenerativeBackend>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let max_upload = state.config.http.max_upload_bytes;

    let routes = Router::new()
        .route("/", get(root_handler))
        .route("/docs", get(docs_handler))
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler).options(analyze_options_handler))
        .route("/history", get(history_handler))
        .with_state(state);

    // CorsLayer answers every OPTIONS itself, so plain OPTIONS requests are
    // dispatched to a copy of the routes without it.
    let plain = routes.clone();

    routes
        // Any origin, credentials allowed. Origins are mirrored because a
        // literal `*` cannot be combined with credentials.
        .layer(CorsLayer::very_permissive())
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            route_plain_options(plain.clone(), req, next)
        }))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
}

/// An `OPTIONS` request carrying both `Origin` and
/// `Access-Control-Request-Method`.
pub fn is_cors_preflight(req: &Request) -> bool {
    req.method() == Method::OPTIONS
        && req.headers().contains_key(header::ORIGIN)
        && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

async fn route_plain_options(plain: Router, req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS || is_cors_preflight(&req) {
        return next.run(req).await;
    }

    match plain.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    pool: SqlitePool,
    config: CoachConfig,
    backend: Arc<dyn GenerativeBackend>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState {
        pool,
        config,
        backend,
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Interview coach API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Parsed `/analyze` form.
#[derive(Debug, Clone)]
pub struct AnalyzeUpload {
    pub question: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// FastAPI-compatible error body: `{"detail": "..."}`.
pub fn detail(msg: impl Into<String>) -> Value {
    json!({ "detail": msg.into() })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub fn root_inner(config: &CoachConfig) -> Value {
    json!({
        "status": "Backend is running",
        "docs_url": config.http.docs_url(),
    })
}

/// Index of the routes this server answers, served at `/docs`.
pub fn docs_inner() -> Value {
    json!({
        "service": "interview-coach",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            { "method": "GET", "path": "/", "description": "Liveness probe" },
            { "method": "GET", "path": "/docs", "description": "This index" },
            { "method": "GET", "path": "/health", "description": "Database probe" },
            { "method": "OPTIONS", "path": "/analyze", "description": "CORS preflight" },
            {
                "method": "POST",
                "path": "/analyze",
                "description": "Analyse a recorded answer",
                "form": { "file": "audio upload", "question": "interview question text" }
            },
            { "method": "GET", "path": "/history", "description": "Recorded interviews, newest first" }
        ]
    })
}

pub async fn health_inner(pool: &SqlitePool) -> (StatusCode, Value) {
    match coach_core::db::health_check(pool).await {
        Ok(sqlite) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "sqlite": sqlite,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Read the `file` and `question` fields. Unknown fields are skipped; a blank
/// question counts as missing.
pub async fn read_analyze_form(mut multipart: Multipart) -> Result<AnalyzeUpload, (StatusCode, Value)> {
    let mut question = None;
    let mut file = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err((e.status(), detail(e.body_text()))),
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("question") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| (e.status(), detail(e.body_text())))?;
                question = Some(text);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("answer").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (e.status(), detail(e.body_text())))?;
                file = Some((file_name, content_type, bytes));
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) = file.ok_or_else(|| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            detail("Missing form field `file`"),
        )
    })?;
    let question = question.filter(|q| !q.trim().is_empty()).ok_or_else(|| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            detail("Missing form field `question`"),
        )
    })?;

    Ok(AnalyzeUpload {
        question,
        file_name,
        content_type,
        bytes,
    })
}

/// Inner analyze: stage, analyse, record, always clean up. Any failure is a
/// 500 with `Analysis failed: ...` as detail.
pub async fn analyze_inner(state: &HttpState, upload: AnalyzeUpload) -> (StatusCode, Value) {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("analyze", %request_id);

    async move {
        tracing::info!(
            file = %upload.file_name,
            question = %upload.question,
            bytes = upload.bytes.len(),
            "Received answer"
        );

        let result = match run_analysis(state, &upload).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(kind = e.kind(), error = %e, "Analysis failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    detail(format!("Analysis failed: {e}")),
                );
            }
        };

        match serde_json::to_value(&result) {
            Ok(body) => {
                tracing::info!("Successfully processed and saved to DB");
                (StatusCode::OK, body)
            }
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(format!("Analysis failed: {e}")),
            ),
        }
    }
    .instrument(span)
    .await
}

async fn run_analysis(state: &HttpState, upload: &AnalyzeUpload) -> Result<AnalysisResult, AnalysisError> {
    let artifact = AudioArtifact::stage(
        &state.config.http.upload_dir(),
        &upload.file_name,
        upload.content_type.as_deref(),
        &upload.bytes,
    )
    .await?;

    let settings = AnalysisSettings::from(&state.config.analysis);
    let outcome = match analyze::analyze(
        state.backend.as_ref(),
        &settings,
        artifact.path(),
        artifact.mime_type(),
        &upload.question,
    )
    .await
    {
        Ok(result) => history::record_interview(&state.pool, &result, &upload.question)
            .await
            .map(|_| result)
            .map_err(AnalysisError::from),
        Err(e) => Err(e),
    };

    artifact.remove();
    outcome
}

pub async fn history_inner(pool: &SqlitePool) -> (StatusCode, Value) {
    let rows = match history::list_history(pool).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load history");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(format!("Could not load history: {e}")),
            );
        }
    };

    match serde_json::to_value(rows) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            detail(format!("Could not serialise history: {e}")),
        ),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn root_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner(&state.config)))
}

pub async fn docs_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(docs_inner()))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn analyze_options_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({})))
}

pub async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let (status, body) = match read_analyze_form(multipart).await {
        Ok(upload) => analyze_inner(&state, upload).await,
        Err(rejection) => rejection,
    };
    (status, Json(body))
}

pub async fn history_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = history_inner(&state.pool).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coach_core::{GeminiError, RemoteMedia};

    /// Backend whose every call fails; for paths that must not reach the provider.
    struct UnreachableBackend;

    #[async_trait]
    impl GenerativeBackend for UnreachableBackend {
        async fn upload_media(&self, _: &str, _: Vec<u8>, _: &str) -> Result<RemoteMedia, GeminiError> {
            Err(GeminiError::Api {
                code: 503,
                message: "provider offline".to_string(),
            })
        }

        async fn media_status(&self, _: &str) -> Result<RemoteMedia, GeminiError> {
            Err(GeminiError::MissingApiKey)
        }

        async fn generate(&self, _: &RemoteMedia, _: &str) -> Result<Value, GeminiError> {
            Err(GeminiError::MissingApiKey)
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    async fn make_state(dir: &tempfile::TempDir) -> HttpState {
        let mut config = CoachConfig::default();
        config.database.url = format!("sqlite://{}", dir.path().join("coach.db").display());
        config.http.upload_dir = dir.path().join("uploads").display().to_string();

        let pool = coach_core::db::create_pool(&config.database).await.unwrap();
        coach_core::db::init_schema(&pool).await.unwrap();

        HttpState {
            pool,
            config,
            backend: Arc::new(UnreachableBackend),
        }
    }

    #[test]
    fn root_reports_status_and_docs_url() {
        let body = root_inner(&CoachConfig::default());
        assert_eq!(body["status"], "Backend is running");
        assert_eq!(body["docs_url"], "http://127.0.0.1:8000/docs");
    }

    #[test]
    fn docs_lists_every_route() {
        let body = docs_inner();
        let paths: Vec<&str> = body["endpoints"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap())
            .collect();
        for path in ["/", "/docs", "/health", "/analyze", "/history"] {
            assert!(paths.contains(&path), "missing {path}");
        }
    }

    #[test]
    fn preflight_needs_origin_and_request_method() {
        let options = |headers: &[(&str, &str)]| {
            let mut builder = axum::http::Request::builder().method("OPTIONS").uri("/analyze");
            for (k, v) in headers {
                builder = builder.header(*k, *v);
            }
            builder.body(axum::body::Body::empty()).unwrap()
        };

        assert!(!is_cors_preflight(&options(&[])));
        assert!(!is_cors_preflight(&options(&[("origin", "http://localhost:5173")])));
        assert!(is_cors_preflight(&options(&[
            ("origin", "http://localhost:5173"),
            ("access-control-request-method", "POST"),
        ])));

        let post = axum::http::Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(!is_cors_preflight(&post));
    }

    #[test]
    fn detail_wraps_message() {
        assert_eq!(detail("boom"), json!({ "detail": "boom" }));
    }

    #[tokio::test]
    async fn health_inner_reports_sqlite_version() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_state(&dir).await;

        let (status, body) = health_inner(&state.pool).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["sqlite"].is_string());
    }

    #[tokio::test]
    async fn provider_failure_is_500_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_state(&dir).await;

        let upload = AnalyzeUpload {
            question: "Why this role?".to_string(),
            file_name: "answer.webm".to_string(),
            content_type: Some("audio/webm".to_string()),
            bytes: Bytes::from_static(b"audio"),
        };

        let (status, body) = analyze_inner(&state, upload).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["detail"].as_str().unwrap();
        assert!(message.starts_with("Analysis failed:"), "{message}");
        assert!(message.contains("provider offline"), "{message}");

        let leftovers = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
        assert_eq!(leftovers, 0, "temp audio must be removed");

        let (_, history) = history_inner(&state.pool).await;
        assert_eq!(history.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn history_inner_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = make_state(&dir).await;

        let (status, body) = history_inner(&state.pool).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}

//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/checkrnc/{rnc}` | Look up one RNC |
//! | `POST` | `/api/reload` | Re-download the dataset and rebuild the index |
//! | `GET`  | `/health` | Health check with index status |
//!
//! # Error Contract
//!
//! Every error response uses the same envelope, including unknown routes
//! (404 `Not found`) and unsupported methods (405 `Method not allowed`):
//!
//! ```json
//! { "error": "This RNC does not exist" }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! call the API directly.

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::Context;
use crate::lookup::{lookup, LookupError, NOT_FOUND_MESSAGE};
use crate::models::{ErrorBody, IndexedRecord};
use crate::store::StoreState;

/// Ensures the dataset and the initial index, then serves until terminated.
///
/// Failing to obtain the dataset or to build the first snapshot is fatal:
/// there would be nothing to serve.
///
/// # Arguments
///
/// * `ctx` - Service context; cloned into every handler.
/// * `port` - Overrides the port of `server.bind` when given.
///
/// # Returns
///
/// Only returns on a startup or listener error.
pub async fn run_server(ctx: Context, port: Option<u16>) -> Result<()> {
    let addr = ctx.config().server.bind_addr(port)?;

    ctx.acquirer().ensure(ctx.dataset_path()).await?;
    let store = ctx.store();
    let snapshot = tokio::task::spawn_blocking(move || store.ensure_built())
        .await?
        .map_err(|e| anyhow::anyhow!("could not build index: {}", e))?;
    tracing::info!(records = snapshot.len(), "index ready");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, router(ctx)).await?;

    Ok(())
}

/// Builds the application router over `ctx`.
pub fn router(ctx: Context) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/checkrnc/{rnc}",
            get(handle_check_rnc).fallback(handle_method_not_allowed),
        )
        .route(
            "/api/checkrnc/",
            get(handle_missing_rnc).fallback(handle_method_not_allowed),
        )
        .route(
            "/api/checkrnc",
            get(handle_missing_rnc).fallback(handle_method_not_allowed),
        )
        .route(
            "/api/reload",
            post(handle_reload).fallback(handle_method_not_allowed),
        )
        .route(
            "/health",
            get(handle_health).fallback(handle_method_not_allowed),
        )
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

// ============ Error response ============

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody::new(self.message))).into_response()
    }
}

fn app_error(status: StatusCode, message: impl Into<String>) -> AppError {
    AppError {
        status,
        message: message.into(),
    }
}

// ============ GET /api/checkrnc/{rnc} ============

async fn handle_check_rnc(
    State(ctx): State<Context>,
    Path(rnc): Path<String>,
) -> Result<Json<IndexedRecord>, AppError> {
    let store = ctx.store();
    let outcome = tokio::task::spawn_blocking(move || lookup(&store, &rnc))
        .await
        .map_err(|e| app_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match outcome {
        Ok(record) => Ok(Json(record)),
        Err(LookupError::NotFound(_)) => Err(app_error(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)),
        Err(err @ LookupError::Unavailable(_)) => {
            Err(app_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))
        }
    }
}

async fn handle_missing_rnc() -> AppError {
    app_error(StatusCode::BAD_REQUEST, "RNC not provided")
}

// ============ POST /api/reload ============

#[derive(Serialize)]
struct ReloadResponse {
    status: &'static str,
}

async fn handle_reload(
    State(ctx): State<Context>,
    headers: HeaderMap,
) -> Result<Json<ReloadResponse>, AppError> {
    if let Some(token) = &ctx.config().server.reload_token {
        let expected = format!("Bearer {}", token);
        let presented = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(app_error(StatusCode::UNAUTHORIZED, "Unauthorized"));
        }
    }

    ctx.acquirer()
        .refresh(ctx.dataset_path(), ctx.store())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "dataset refresh failed");
            app_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error downloading CSV: {}", e),
            )
        })?;

    Ok(Json(ReloadResponse { status: "reloaded" }))
}

async fn handle_method_not_allowed() -> AppError {
    app_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn handle_not_found() -> AppError {
    app_error(StatusCode::NOT_FOUND, "Not found")
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    index: &'static str,
    records: Option<usize>,
    built_at: Option<String>,
    generation: u64,
}

async fn handle_health(State(ctx): State<Context>) -> Json<HealthResponse> {
    let store = ctx.store();
    let state = store.state();
    let index = match state {
        StoreState::Uninitialized => "uninitialized",
        StoreState::Building => "building",
        StoreState::Published => "published",
    };
    // Never wait on an in-flight build here.
    let snapshot = match state {
        StoreState::Published => store.snapshot(),
        _ => None,
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        index,
        records: snapshot.as_ref().map(|s| s.len()),
        built_at: snapshot
            .as_ref()
            .map(|s| s.built_at().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        generation: store.generation(),
    })
}

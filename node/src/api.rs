//! # Construction API
//!
//! Builds the axum router that exposes the Construction pipeline over HTTP.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                      | Description                          |
//! |--------|---------------------------|--------------------------------------|
//! | GET    | `/health`                 | Liveness probe                       |
//! | POST   | `/construction/derive`     | Public key → account                 |
//! | POST   | `/construction/preprocess` | Operations → options                 |
//! | POST   | `/construction/metadata`   | Options → chain metadata (online)    |
//! | POST   | `/construction/payloads`   | Unsigned transaction + payloads      |
//! | POST   | `/construction/parse`      | Transaction → operations             |
//! | POST   | `/construction/combine`    | Attach signatures                    |
//! | POST   | `/construction/hash`       | Transaction id                       |
//! | POST   | `/construction/submit`     | Broadcast (online)                   |
//! | POST   | `/call`                    | Dry-run clause inspection (online)   |
//!
//! Success is 200 with the response body. Chain-node failures are 500 with
//! a retriable error object; every other failure is 400.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use thor_mesh::config::Mode;
use thor_mesh::construction::types::*;
use thor_mesh::{ConstructionService, MeshError};

use crate::metrics::{SharedMetrics, OUTCOME_NODE_ERROR, OUTCOME_OK, OUTCOME_REJECTED};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConstructionService>,
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Turns a pipeline result into a response and records it.
    fn respond<T: Serialize>(
        &self,
        endpoint: &'static str,
        started: Instant,
        result: Result<T, MeshError>,
    ) -> Response {
        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(body) => {
                self.metrics.observe(endpoint, OUTCOME_OK, elapsed);
                (StatusCode::OK, Json(body)).into_response()
            }
            Err(err) => {
                let (status, outcome) = if err.retriable() {
                    (StatusCode::INTERNAL_SERVER_ERROR, OUTCOME_NODE_ERROR)
                } else {
                    (StatusCode::BAD_REQUEST, OUTCOME_REJECTED)
                };
                warn!(endpoint, code = err.code(), error = %err, "request failed");
                self.metrics.observe(endpoint, outcome, elapsed);
                (status, Json(err.to_api_error())).into_response()
            }
        }
    }
}

/// Unparseable JSON is a request-shape error like any other.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, MeshError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| MeshError::InvalidRequest(e.body_text()))
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/construction/derive", post(derive_handler))
        .route("/construction/preprocess", post(preprocess_handler))
        .route("/construction/metadata", post(metadata_handler))
        .route("/construction/payloads", post(payloads_handler))
        .route("/construction/parse", post(parse_handler))
        .route("/construction/combine", post(combine_handler))
        .route("/construction/hash", post(hash_handler))
        .route("/construction/submit", post(submit_handler))
        .route("/call", post(call_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the server is alive. Does not touch the
/// chain node.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.service.config();
    let mode = match config.mode {
        Mode::Online => "online",
        Mode::Offline => "offline",
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "network": config.network,
            "mode": mode,
        })),
    )
}

async fn derive_handler(
    State(state): State<AppState>,
    payload: Result<Json<DeriveRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = body(payload).and_then(|req| state.service.derive(&req));
    state.respond("derive", started, result)
}

async fn preprocess_handler(
    State(state): State<AppState>,
    payload: Result<Json<PreprocessRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = body(payload).and_then(|req| state.service.preprocess(&req));
    state.respond("preprocess", started, result)
}

async fn metadata_handler(
    State(state): State<AppState>,
    payload: Result<Json<MetadataRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = match body(payload) {
        Ok(req) => state.service.metadata(&req).await,
        Err(e) => Err(e),
    };
    state.respond("metadata", started, result)
}

async fn payloads_handler(
    State(state): State<AppState>,
    payload: Result<Json<PayloadsRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = body(payload).and_then(|req| state.service.payloads(&req));
    state.respond("payloads", started, result)
}

async fn parse_handler(
    State(state): State<AppState>,
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = match body(payload) {
        Ok(req) => state.service.parse(&req).await,
        Err(e) => Err(e),
    };
    state.respond("parse", started, result)
}

async fn combine_handler(
    State(state): State<AppState>,
    payload: Result<Json<CombineRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = body(payload).and_then(|req| state.service.combine(&req));
    state.respond("combine", started, result)
}

async fn hash_handler(
    State(state): State<AppState>,
    payload: Result<Json<HashRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = body(payload).and_then(|req| state.service.hash(&req));
    state.respond("hash", started, result)
}

async fn submit_handler(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = match body(payload) {
        Ok(req) => state.service.submit(&req).await,
        Err(e) => Err(e),
    };
    state.respond("submit", started, result)
}

async fn call_handler(
    State(state): State<AppState>,
    payload: Result<Json<CallRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = match body(payload) {
        Ok(req) => state.service.call(&req).await,
        Err(e) => Err(e),
    };
    state.respond("call", started, result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

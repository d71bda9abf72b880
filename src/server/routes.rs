//! Route table and handlers.
//!
//! Handlers are thin: they decode the body, call the bridge, and always
//! answer `200 OK` with the bridge's tagged JSON. A body that cannot be
//! read or parsed, and a handler that panics, produce the same
//! `{status: "error", message}` shape as any other failure.

use crate::bridge::{AnalyzeRequest, AnalyzeResponse, Bridge, PolicyRequest, PolicyResponse};
use crate::gate::panic_message;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

/// Largest accepted request body. Full-resolution frames sent back to
/// `/analyze_image` as base64 run to several megabytes.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Builds the router with its body limit and panic guard.
///
/// CORS and tracing are added by [`super::app`].
pub fn router(bridge: Bridge) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/camera/capture", get(capture_handler))
        .route("/session", post(session_handler))
        .route("/analyze_image", post(analyze_handler))
        .route("/robot/run_policy", post(run_policy_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(bridge)
}

/// Turns a handler panic into the uniform error body.
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic_message(payload);
    tracing::error!(%message, "Request handler panicked");
    Json(PolicyResponse::error(format!("internal error: {message}"))).into_response()
}

/// Parses a JSON body. An empty body yields `T::default()` when `empty` is set.
fn parse_body<T: DeserializeOwned>(
    body: Result<Bytes, BytesRejection>,
    empty: Option<T>,
) -> Result<T, String> {
    let body = body.map_err(|e| format!("invalid request body: {}", e.body_text()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        if let Some(value) = empty {
            return Ok(value);
        }
    }
    serde_json::from_slice(&body).map_err(|e| format!("invalid request body: {e}"))
}

/// Handler for `GET /`.
async fn health_handler(State(bridge): State<Bridge>) -> impl IntoResponse {
    Json(bridge.health())
}

/// Handler for `GET /camera/capture`.
async fn capture_handler(State(bridge): State<Bridge>) -> impl IntoResponse {
    Json(bridge.capture_scene().await)
}

/// Handler for `POST /session`.
async fn session_handler(State(bridge): State<Bridge>) -> impl IntoResponse {
    Json(bridge.create_session().await)
}

/// Handler for `POST /analyze_image`.
async fn analyze_handler(
    State(bridge): State<Bridge>,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    match parse_body::<AnalyzeRequest>(body, Some(AnalyzeRequest::default())) {
        Ok(request) => Json(bridge.analyze_image(request).await),
        Err(message) => Json(AnalyzeResponse::Error { message }),
    }
}

/// Handler for `POST /robot/run_policy`.
async fn run_policy_handler(
    State(bridge): State<Bridge>,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    match parse_body::<PolicyRequest>(body, None) {
        Ok(request) => Json(bridge.run_policy(request).await),
        Err(message) => {
            tracing::warn!(%message, "Rejected policy request");
            Json(PolicyResponse::error(message))
        }
    }
}

/// Handler for `GET /metrics`.
async fn metrics_handler(State(bridge): State<Bridge>) -> impl IntoResponse {
    match bridge.render_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

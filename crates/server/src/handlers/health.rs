//! Health check endpoints for Kubernetes-style probes.
//!
//! - `/livez` - Basic liveness probe (immediate 200, no checks)
//! - `/readyz` - Readiness probe (round-trip to the key/value store)

use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::state::AppState;

/// GET /livez - Basic liveness probe.
///
/// Returns 200 immediately without touching the key/value store.
#[axum::debug_handler]
pub async fn livez() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct ReadyStatus {
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /readyz - Readiness probe.
///
/// Pings the key/value store. Returns 200 when it answers, 503 otherwise.
#[axum::debug_handler]
pub async fn readyz(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let result = state.store.ping().await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyStatus {
                healthy: true,
                latency_ms,
                error: None,
            }),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, unavailable = err.is_unavailable(), "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyStatus {
                    healthy: false,
                    latency_ms,
                    error: Some(err.to_string()),
                }),
            )
                .into_response()
        }
    }
}

//! Administrative access to the distributed id sequences.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiResponse, AppError},
    extractors::AdminSession,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct SequenceValue {
    pub name: String,
    pub value: i64,
}

/// GET /api/admin/sequences/{name} - Current value of a counter.
///
/// Reading a counter that was never used creates it at 1.
pub async fn get_sequence(
    State(state): State<AppState>,
    AdminSession(_admin): AdminSession,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<SequenceValue>>, AppError> {
    let value = state.sequence.current_value(&name).await?;
    Ok(ApiResponse::ok(SequenceValue { name, value }))
}

#[derive(Debug, Deserialize)]
pub struct InitializeSequence {
    pub value: i64,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct SequenceInitialized {
    pub name: String,
    pub written: bool,
}

/// PUT /api/admin/sequences/{name} - Seed a counter.
///
/// Without `force` an existing counter is left untouched.
pub async fn initialize_sequence(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(name): Path<String>,
    Json(body): Json<InitializeSequence>,
) -> Result<Json<ApiResponse<SequenceInitialized>>, AppError> {
    let written = state
        .sequence
        .initialize(&name, body.value, body.force)
        .await?;

    tracing::warn!(
        admin_id = admin.actor_id(),
        counter = %name,
        value = body.value,
        force = body.force,
        written,
        "Sequence initialization requested"
    );
    Ok(ApiResponse::ok(SequenceInitialized { name, written }))
}

/// DELETE /api/admin/sequences/{name} - Drop a counter.
pub async fn clear_sequence(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    state.sequence.clear(&name).await?;
    tracing::warn!(admin_id = admin.actor_id(), counter = %name, "Sequence cleared");
    Ok(ApiResponse::ok(true))
}

//! Development-only maintenance endpoints.

use crate::{errors::AppError, state::AppState};
use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Serialize)]
pub struct ResetResponse {
    deleted: u64,
}

/// `POST /admin/reset`: drop every video record. Refused outside `dev`.
pub async fn reset(State(state): State<AppState>) -> Result<Json<ResetResponse>, AppError> {
    if !state.config.is_dev() {
        return Err(AppError::forbidden(
            "Reset is only allowed in dev environment.",
        ));
    }

    let deleted = state.metadata.reset().await?;
    tracing::warn!(deleted, "metadata reset");
    Ok(Json(ResetResponse { deleted }))
}

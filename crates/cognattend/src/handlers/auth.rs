use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::server::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

/// Plaintext credential check against the admins table.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    if state.store.verify_admin(&req.id, &req.password).await? {
        tracing::info!(admin = %req.id, "admin login");
        Ok(Json(json!({ "ok": true })))
    } else {
        tracing::warn!(admin = %req.id, "rejected login");
        Err(AppError::unauthorized("invalid admin id or password"))
    }
}

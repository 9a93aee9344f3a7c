//! Health check endpoints.

use axum::extract::State;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> Result<&'static str> {
    state
        .repositories()
        .accounts
        .ping()
        .await
        .map_err(|e| AppError::Unavailable(format!("database ping failed: {e}")))?;
    Ok("ok")
}

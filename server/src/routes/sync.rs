//! Sync pass routes.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use outbox_engine::SyncStats;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(run_pass))
        .route("/sync/stats", get(stats))
}

/// POST /sync - Run one pass now. 409 if a pass is already running.
async fn run_pass(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<SyncStats>> {
    let stats = state.engine.run_sync_pass().await?;
    Ok(Json(stats))
}

/// GET /sync/stats
async fn stats(State(state): State<AppState>) -> Json<SyncStats> {
    Json(state.engine.stats().await)
}

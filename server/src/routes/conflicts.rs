//! Conflict registry routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use outbox_engine::{ResolutionStrategy, SyncConflict, SyncOperation};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conflicts", get(list))
        .route("/conflicts/{id}", get(get_conflict))
        .route("/conflicts/{id}/resolve", post(resolve))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub strategy: ResolutionStrategy,
}

/// GET /conflicts - Live conflicts, most recent first.
async fn list(State(state): State<AppState>) -> Json<Vec<SyncConflict>> {
    Json(state.engine.list_conflicts().await)
}

async fn get_conflict(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SyncConflict>> {
    Ok(Json(state.engine.get_conflict(&id).await?))
}

/// POST /conflicts/{id}/resolve - Apply a strategy and re-send the operation.
///
/// Responds with the operation as it stands after the re-send.
async fn resolve(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<SyncOperation>> {
    let operation = state.engine.resolve_conflict(&id, request.strategy).await?;
    Ok(Json(operation))
}

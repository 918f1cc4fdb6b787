//! Runtime sync configuration routes.

use axum::{extract::State, routing::get, Json, Router};
use outbox_engine::{SyncConfig, SyncConfigUpdate};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/config", get(get_config).patch(update_config))
}

async fn get_config(State(state): State<AppState>) -> Json<SyncConfig> {
    Json(state.engine.config())
}

/// PATCH /config - Merge a partial update. Invalid values leave the config as is.
async fn update_config(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(update): Json<SyncConfigUpdate>,
) -> Result<Json<SyncConfig>> {
    let config = state.engine.update_config(&update)?;
    Ok(Json(config))
}

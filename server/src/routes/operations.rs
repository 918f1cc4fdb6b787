//! Operation queue routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use outbox_engine::{NewOperation, OperationFilter, SyncOperation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::AppState;

/// Create operation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/operations", post(enqueue).get(list))
        .route("/operations/completed", delete(remove_completed))
        .route("/operations/{id}", get(get_operation))
        .route("/operations/{id}/requeue", post(requeue))
}

/// Query parameters for listing operations. Sets are comma-separated.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub entity_type: Option<String>,
    pub priority: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<OperationFilter> {
        Ok(OperationFilter {
            statuses: self.status.as_deref().map(parse_set).transpose()?,
            entity_type: self.entity_type.filter(|t| !t.is_empty()),
            priorities: self.priority.as_deref().map(parse_set).transpose()?,
        })
    }
}

/// Parse `a,b,c` into lowercase enum values.
fn parse_set<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            serde_json::from_value(serde_json::Value::String(item.to_ascii_lowercase()))
                .map_err(|_| AppError::BadRequest(format!("Unknown filter value '{}'", item)))
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

/// POST /operations - Queue a mutation.
async fn enqueue(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(request): Json<NewOperation>,
) -> Result<(StatusCode, Json<SyncOperation>)> {
    let id = state.engine.enqueue(request).await;
    let operation = state.engine.get_operation(&id).await?;
    Ok((StatusCode::CREATED, Json(operation)))
}

/// GET /operations - List operations, most recent first.
async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SyncOperation>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.engine.list_operations(&filter).await))
}

/// GET /operations/{id}
async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SyncOperation>> {
    Ok(Json(state.engine.get_operation(&id).await?))
}

/// POST /operations/{id}/requeue - Queue a fresh copy of a failed operation.
async fn requeue(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SyncOperation>)> {
    let new_id = state.engine.requeue(&id).await?;
    let operation = state.engine.get_operation(&new_id).await?;
    Ok((StatusCode::CREATED, Json(operation)))
}

/// DELETE /operations/completed
async fn remove_completed(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Json<RemovedResponse> {
    Json(RemovedResponse {
        removed: state.engine.remove_completed().await,
    })
}

//! HTTP route definitions.

mod config;
mod conflicts;
mod events;
mod health;
mod operations;
mod sync;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(operations::routes())
        .merge(sync::routes())
        .merge(conflicts::routes())
        .merge(config::routes())
        .merge(events::routes())
}

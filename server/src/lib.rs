//! Outbox Server - HTTP host for the outbox sync engine.
//!
//! Exposes the operation queue, sync passes, conflicts, and runtime config
//! over HTTP, and streams engine events to WebSocket clients.

pub mod auth;
pub mod config;
pub mod error;
pub mod remote;
pub mod routes;
pub mod websocket;

use crate::config::Config;
use crate::websocket::ConnectionManager;
use axum::Router;
use outbox_engine::SyncEngine;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: SyncEngine,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
}

impl AppState {
    /// Build state around an engine and start forwarding its events to
    /// WebSocket clients.
    pub fn new(engine: SyncEngine, config: Config) -> Self {
        let conn_manager = ConnectionManager::new_shared();
        conn_manager.clone().forward_events(engine.subscribe());

        Self {
            engine,
            config: Arc::new(config),
            conn_manager,
        }
    }
}

/// Build the application router with tracing and CORS layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

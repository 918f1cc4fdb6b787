//! Outbox Server binary.
//!
//! Loads configuration from the environment, connects the sync engine to the
//! remote store over HTTP, starts the auto-sync scheduler, and serves the API.

use outbox_engine::SyncEngine;
use outbox_server::config::Config;
use outbox_server::remote::HttpRemote;
use outbox_server::{build_router, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "outbox_server=debug,outbox_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Outbox Server on {}:{}", config.host, config.port);
    tracing::info!(
        remote = %config.remote_url,
        auto_sync = config.sync.auto_sync,
        interval_minutes = config.sync.sync_interval_minutes,
        "Remote store configured"
    );

    let remote = HttpRemote::new(config.remote_url.clone(), config.remote_timeout)?;
    let engine = SyncEngine::new(Arc::new(remote), config.sync.clone())?;
    let _scheduler = engine.start_auto_sync();

    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(AppState::new(engine, config));

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

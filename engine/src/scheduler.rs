//! Periodic auto-sync trigger.
//!
//! The scheduler re-reads the engine config on every tick and re-arms as soon
//! as the config changes, so interval and on/off updates apply without a
//! restart.

use crate::{Error, SyncEngine};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running scheduler task. Dropping it stops the scheduler.
#[derive(Debug)]
pub struct AutoSyncScheduler {
    handle: JoinHandle<()>,
}

impl AutoSyncScheduler {
    /// Spawn the scheduler on the current tokio runtime.
    pub fn spawn(engine: SyncEngine) -> Self {
        Self {
            handle: tokio::spawn(run(engine)),
        }
    }

    /// Stop the scheduler. A pass already running still finishes.
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for AutoSyncScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(engine: SyncEngine) {
    let mut config_rx = engine.subscribe_config();
    info!("Auto-sync scheduler started");

    loop {
        let config = config_rx.borrow_and_update().clone();

        if !config.auto_sync {
            debug!("Auto-sync disabled, waiting for config change");
            if config_rx.changed().await.is_err() {
                break;
            }
            continue;
        }

        let period = config.sync_interval();
        debug!(interval_secs = period.as_secs(), "Auto-sync armed");

        tokio::select! {
            _ = tokio::time::sleep(period) => tick(&engine).await,
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("Sync config changed, re-arming");
            }
        }
    }

    info!("Auto-sync scheduler stopped");
}

async fn tick(engine: &SyncEngine) {
    if engine.is_syncing() {
        debug!("Sync pass already running, skipping tick");
        return;
    }

    match engine.run_sync_pass().await {
        Ok(stats) => debug!(
            completed = stats.completed,
            failed = stats.failed,
            "Scheduled sync pass finished"
        ),
        Err(Error::SyncInProgress) => debug!("Sync pass already running, skipping tick"),
        Err(e) => warn!(error = %e, "Scheduled sync pass failed"),
    }
}

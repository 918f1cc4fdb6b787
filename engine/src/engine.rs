//! The sync engine - owner of the queue, the conflict registry, and the
//! batch executor.
//!
//! [`SyncEngine`] is a cheap handle; clones share the same state. All state
//! lives behind one async lock that is never held across a remote call, so
//! operations in the same batch reach the remote store concurrently.
//!
//! Passes and post-resolution re-sends run on their own tasks. Dropping the
//! future that awaits them (an aborted scheduler, a disconnected HTTP client)
//! never leaves an operation stranded in `syncing`.

use crate::{
    conflict::ConflictRegistry,
    error::Result,
    now_millis,
    queue::OperationQueue,
    remote::{Dispatch, RemoteReply},
    resolve::resolve_value,
    AutoSyncScheduler, ConflictId, Error, EventBus, NewOperation, OperationFilter, OperationId,
    OperationStatus, RemoteStore, ResolutionStrategy, SyncConfig, SyncConfigUpdate, SyncConflict,
    SyncEvent, SyncOperation, SyncStats, Timestamp,
};
use futures::future::join_all;
use std::cmp::Reverse;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How many times one operation is re-sent right after an automatic
/// resolution within a single call. Further conflicts leave it `pending`
/// for the next pass.
const MAX_EAGER_RESYNCS: u32 = 1;

/// Mutable engine state guarded by a single lock.
#[derive(Debug, Default)]
struct EngineState {
    queue: OperationQueue,
    conflicts: ConflictRegistry,
    last_sync_at: Option<Timestamp>,
}

impl EngineState {
    fn stats(&self, sync_in_progress: bool) -> SyncStats {
        let total = self.queue.len();
        let completed = self.queue.count(OperationStatus::Completed);

        SyncStats {
            total,
            pending: self.queue.count(OperationStatus::Pending),
            syncing: self.queue.count(OperationStatus::Syncing),
            completed,
            failed: self.queue.count(OperationStatus::Failed),
            conflicts: self.conflicts.len(),
            sync_in_progress,
            success_rate: SyncStats::success_rate(completed, total),
            last_sync_at: self.last_sync_at,
        }
    }
}

struct Inner {
    state: RwLock<EngineState>,
    config: watch::Sender<SyncConfig>,
    remote: Arc<dyn RemoteStore>,
    events: EventBus,
    syncing: Arc<AtomicBool>,
}

/// Holds the single-pass flag; clears it when dropped, including on unwind.
struct PassGuard(Arc<AtomicBool>);

impl PassGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard(flag.clone()))
    }
}

/// Await a detached task, re-raising its panic in the caller.
///
/// These tasks are never aborted, so a join error always carries a panic.
async fn join_detached<T>(handle: JoinHandle<T>) -> T {
    match handle.await {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e.into_panic()),
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Local-mutation sync engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &*self.inner.config.borrow())
            .field("syncing", &self.is_syncing())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Create an engine reconciling against `remote`.
    pub fn new(remote: Arc<dyn RemoteStore>, config: SyncConfig) -> Result<Self> {
        Self::with_event_bus(remote, config, EventBus::default())
    }

    /// Create an engine publishing to an existing event bus.
    pub fn with_event_bus(
        remote: Arc<dyn RemoteStore>,
        config: SyncConfig,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;
        let (config, _) = watch::channel(config);

        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(EngineState::default()),
                config,
                remote,
                events,
                syncing: Arc::new(AtomicBool::new(false)),
            }),
        })
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    /// Queue a mutation as `pending`. Never rejects and never deduplicates.
    pub async fn enqueue(&self, request: NewOperation) -> OperationId {
        let id = uuid::Uuid::new_v4().to_string();
        let max_retries = self.config().max_retries;
        let operation = request.into_operation(id.clone(), max_retries, now_millis());

        debug!(
            op_id = %id,
            kind = ?operation.kind,
            entity_type = %operation.entity_type,
            priority = ?operation.priority,
            "Operation queued"
        );

        self.inner.state.write().await.queue.insert(operation.clone());
        self.inner.events.publish(SyncEvent::OperationQueued {
            id: id.clone(),
            operation,
        });

        id
    }

    /// Operations matching `filter`, most recent first.
    pub async fn list_operations(&self, filter: &OperationFilter) -> Vec<SyncOperation> {
        self.inner.state.read().await.queue.list(filter)
    }

    pub async fn get_operation(&self, id: &str) -> Result<SyncOperation> {
        self.inner
            .state
            .read()
            .await
            .queue
            .get(id)
            .cloned()
            .ok_or_else(|| Error::OperationNotFound(id.to_string()))
    }

    /// Purge completed operations. Returns how many were removed.
    pub async fn remove_completed(&self) -> usize {
        let removed = self.inner.state.write().await.queue.remove_completed();
        info!(removed, "Removed completed operations");
        removed
    }

    /// Queue a fresh copy of a `failed` operation.
    ///
    /// The failed record stays in place unchanged; the copy starts with a new
    /// id and a zero retry count.
    pub async fn requeue(&self, id: &str) -> Result<OperationId> {
        let request = {
            let state = self.inner.state.read().await;
            let op = state
                .queue
                .get(id)
                .ok_or_else(|| Error::OperationNotFound(id.to_string()))?;
            if op.status != OperationStatus::Failed {
                return Err(Error::NotRequeueable {
                    id: id.to_string(),
                    status: op.status,
                });
            }
            NewOperation::from(op)
        };

        let new_id = self.enqueue(request).await;
        info!(op_id = %id, new_op_id = %new_id, "Requeued failed operation");
        Ok(new_id)
    }

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    /// Live conflicts, most recent first.
    pub async fn list_conflicts(&self) -> Vec<SyncConflict> {
        self.inner.state.read().await.conflicts.list()
    }

    pub async fn get_conflict(&self, conflict_id: &str) -> Result<SyncConflict> {
        self.inner
            .state
            .read()
            .await
            .conflicts
            .get(conflict_id)
            .cloned()
            .ok_or_else(|| Error::ConflictNotFound(conflict_id.to_string()))
    }

    /// Settle a conflict and immediately re-send its operation.
    ///
    /// Returns the operation as it stands after the re-send. The re-send
    /// completes even if this future is dropped.
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        strategy: ResolutionStrategy,
    ) -> Result<SyncOperation> {
        let conflict = self.apply_resolution(conflict_id, strategy).await?;

        let engine = self.clone();
        let op_id = conflict.operation_id.clone();
        join_detached(tokio::spawn(async move {
            engine.sync_operation(&op_id).await;
        }))
        .await;

        self.get_operation(&conflict.operation_id).await
    }

    /// Resolve without re-sending: remove the conflict and put the operation
    /// back to `pending` with the resolved payload.
    async fn apply_resolution(
        &self,
        conflict_id: &str,
        strategy: ResolutionStrategy,
    ) -> Result<SyncConflict> {
        let conflict = {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            let resolved = {
                let conflict = state
                    .conflicts
                    .get(conflict_id)
                    .ok_or_else(|| Error::ConflictNotFound(conflict_id.to_string()))?;
                resolve_value(conflict, strategy)
            };
            state
                .conflicts
                .resolve(&mut state.queue, conflict_id, resolved)?
        };

        info!(
            conflict_id = %conflict_id,
            op_id = %conflict.operation_id,
            strategy = ?strategy,
            "Conflict resolved"
        );
        self.inner.events.publish(SyncEvent::ConflictResolved {
            conflict_id: conflict.id.clone(),
            operation_id: conflict.operation_id.clone(),
            strategy,
        });

        Ok(conflict)
    }

    // ------------------------------------------------------------------
    // Sync passes
    // ------------------------------------------------------------------

    /// Whether a pass is currently running.
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    /// Run one sync pass over every eligible operation.
    ///
    /// Operations are sent in priority order, `batchSize` at a time. Each
    /// batch is awaited as a whole before the next starts; a failing
    /// operation never stops its siblings. Fails only when another pass is
    /// already running.
    ///
    /// The pass runs on its own task and finishes even if this future is
    /// dropped.
    pub async fn run_sync_pass(&self) -> Result<SyncStats> {
        let guard = PassGuard::acquire(&self.inner.syncing).ok_or(Error::SyncInProgress)?;
        let engine = self.clone();
        Ok(join_detached(tokio::spawn(engine.execute_pass(guard))).await)
    }

    async fn execute_pass(self, guard: PassGuard) -> SyncStats {
        let batch_size = self.config().batch_size.max(1);

        let mut selected = self.inner.state.read().await.queue.eligible();
        // Stable: equal priorities keep queue order.
        selected.sort_by_key(|(_, priority)| Reverse(priority.weight()));

        info!(
            operations = selected.len(),
            batch_size, "Starting sync pass"
        );

        for (index, batch) in selected.chunks(batch_size).enumerate() {
            debug!(batch = index, size = batch.len(), "Dispatching batch");
            join_all(batch.iter().map(|(id, _)| self.sync_operation(id))).await;
        }

        drop(guard);

        let stats = {
            let mut state = self.inner.state.write().await;
            state.last_sync_at = Some(now_millis());
            state.stats(self.is_syncing())
        };

        info!(
            completed = stats.completed,
            pending = stats.pending,
            failed = stats.failed,
            conflicts = stats.conflicts,
            "Sync pass finished"
        );
        self.inner.events.publish(SyncEvent::SyncCompleted {
            stats: stats.clone(),
        });

        stats
    }

    /// Send one operation, auto-resolving and re-sending when policy allows.
    async fn sync_operation(&self, id: &str) {
        let mut eager_resyncs = 0;

        while let Some(conflict_id) = self.attempt(id).await {
            if let Err(e) = self
                .apply_resolution(&conflict_id, ResolutionStrategy::Auto)
                .await
            {
                warn!(op_id = %id, error = %e, "Automatic resolution failed");
                return;
            }

            if eager_resyncs == MAX_EAGER_RESYNCS {
                debug!(op_id = %id, "Conflict repeated, leaving operation for next pass");
                return;
            }
            eager_resyncs += 1;
        }
    }

    /// One round trip for one operation.
    ///
    /// Returns the id of a freshly recorded conflict that should be resolved
    /// automatically.
    async fn attempt(&self, id: &str) -> Option<ConflictId> {
        let dispatch = {
            let mut state = self.inner.state.write().await;
            let op = state.queue.get_mut(id)?;
            if !op.is_eligible() {
                debug!(op_id = %id, status = ?op.status, "Operation no longer eligible");
                return None;
            }
            op.status = OperationStatus::Syncing;
            Dispatch {
                kind: op.kind,
                entity_type: op.entity_type.clone(),
                entity_id: op.entity_id.clone(),
                data: op.local_data.clone(),
            }
        };

        let result = dispatch.send(self.inner.remote.as_ref()).await;
        let now = now_millis();

        let mut guard = self.inner.state.write().await;
        let state = &mut *guard;
        let op = state.queue.get_mut(id)?;

        match result {
            Ok(RemoteReply::Applied { data }) => {
                op.status = OperationStatus::Completed;
                op.completed_at = Some(now);
                op.error = None;
                if data.is_some() {
                    op.remote_data = data;
                }
                debug!(op_id = %id, "Operation synced");
                None
            }
            Ok(RemoteReply::Conflict { remote, last_sync }) => {
                let conflict = SyncConflict::detect(op, remote, last_sync, now);
                let conflict_id = conflict.id.clone();
                let auto_resolve = conflict.auto_resolvable
                    && self.config().conflict_resolution.resolves_automatically();

                if let Err(e) = state.conflicts.record(&mut state.queue, conflict.clone()) {
                    warn!(op_id = %id, error = %e, "Failed to record conflict");
                    return None;
                }
                drop(guard);

                info!(
                    op_id = %id,
                    conflict_id = %conflict_id,
                    conflict_type = ?conflict.conflict_type,
                    auto_resolvable = conflict.auto_resolvable,
                    "Conflict detected"
                );
                self.inner.events.publish(SyncEvent::ConflictDetected {
                    conflict_id: conflict_id.clone(),
                    conflict,
                });

                auto_resolve.then_some(conflict_id)
            }
            Err(e) => {
                op.retry_count = op.retry_count.saturating_add(1).min(op.max_retries);
                op.error = Some(e.to_string());
                op.status = if op.retry_count >= op.max_retries {
                    OperationStatus::Failed
                } else {
                    OperationStatus::Pending
                };
                warn!(
                    op_id = %id,
                    retry_count = op.retry_count,
                    max_retries = op.max_retries,
                    status = ?op.status,
                    error = %e,
                    "Operation sync failed"
                );
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Stats, config, events
    // ------------------------------------------------------------------

    pub async fn stats(&self) -> SyncStats {
        self.inner.state.read().await.stats(self.is_syncing())
    }

    /// Current config snapshot.
    pub fn config(&self) -> SyncConfig {
        self.inner.config.borrow().clone()
    }

    /// Apply a partial config update. Takes effect on the next scheduler tick
    /// and the next pass.
    pub fn update_config(&self, update: &SyncConfigUpdate) -> Result<SyncConfig> {
        let merged = self.config().merged(update);
        merged.validate()?;
        self.inner.config.send_replace(merged.clone());
        info!(config = ?merged, "Sync config updated");
        Ok(merged)
    }

    /// Watch config changes.
    pub fn subscribe_config(&self) -> watch::Receiver<SyncConfig> {
        self.inner.config.subscribe()
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Start the periodic auto-sync trigger for this engine.
    pub fn start_auto_sync(&self) -> AutoSyncScheduler {
        AutoSyncScheduler::spawn(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RemoteError, RemoteStore};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Remote that accepts everything.
    struct AcceptAll;

    #[async_trait]
    impl RemoteStore for AcceptAll {
        async fn create(&self, _: &str, data: &Value) -> std::result::Result<RemoteReply, RemoteError> {
            Ok(RemoteReply::Applied {
                data: Some(data.clone()),
            })
        }

        async fn update(
            &self,
            _: &str,
            _: &str,
            data: &Value,
        ) -> std::result::Result<RemoteReply, RemoteError> {
            Ok(RemoteReply::Applied {
                data: Some(data.clone()),
            })
        }

        async fn delete(&self, _: &str, _: &str) -> std::result::Result<RemoteReply, RemoteError> {
            Ok(RemoteReply::Applied { data: None })
        }
    }

    fn engine() -> SyncEngine {
        SyncEngine::new(Arc::new(AcceptAll), SyncConfig::default()).unwrap()
    }

    #[test]
    fn pass_guard_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = PassGuard::acquire(&flag).unwrap();
        assert!(PassGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(PassGuard::acquire(&flag).is_some());
    }

    #[test]
    fn invalid_initial_config_rejected() {
        let config = SyncConfig {
            batch_size: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(
            SyncEngine::new(Arc::new(AcceptAll), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn enqueue_uses_config_max_retries() {
        let engine = engine();
        engine
            .update_config(&SyncConfigUpdate {
                max_retries: Some(7),
                ..SyncConfigUpdate::default()
            })
            .unwrap();

        let id = engine
            .enqueue(NewOperation::create("bookings", json!({})))
            .await;
        let op = engine.get_operation(&id).await.unwrap();
        assert_eq!(op.max_retries, 7);
        assert_eq!(op.status, OperationStatus::Pending);
    }

    #[tokio::test]
    async fn enqueue_publishes_event() {
        let engine = engine();
        let mut events = engine.subscribe();

        let id = engine
            .enqueue(NewOperation::delete("bookings", "b-1"))
            .await;

        match events.recv().await.unwrap() {
            SyncEvent::OperationQueued { id: event_id, operation } => {
                assert_eq!(event_id, id);
                assert_eq!(operation.entity_id.as_deref(), Some("b-1"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn completed_pass_records_remote_snapshot() {
        let engine = engine();
        let id = engine
            .enqueue(NewOperation::update("bookings", "b-1", json!({"amount": 5})))
            .await;

        let stats = engine.run_sync_pass().await.unwrap();
        assert_eq!(stats.completed, 1);
        assert!(!stats.sync_in_progress);
        assert!(stats.last_sync_at.is_some());

        let op = engine.get_operation(&id).await.unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
        assert!(op.completed_at.is_some());
        assert_eq!(op.remote_data, Some(json!({"amount": 5})));
    }

    #[tokio::test]
    async fn unknown_ids_are_errors() {
        let engine = engine();
        assert_eq!(
            engine.get_operation("nope").await.unwrap_err(),
            Error::OperationNotFound("nope".into())
        );
        assert_eq!(
            engine.get_conflict("nope").await.unwrap_err(),
            Error::ConflictNotFound("nope".into())
        );
        assert_eq!(
            engine
                .resolve_conflict("nope", ResolutionStrategy::LocalWins)
                .await
                .unwrap_err(),
            Error::ConflictNotFound("nope".into())
        );
    }

    #[tokio::test]
    async fn requeue_requires_failed_status() {
        let engine = engine();
        let id = engine
            .enqueue(NewOperation::create("bookings", json!({})))
            .await;

        let err = engine.requeue(&id).await.unwrap_err();
        assert_eq!(
            err,
            Error::NotRequeueable {
                id: id.clone(),
                status: OperationStatus::Pending
            }
        );
    }

    #[tokio::test]
    async fn invalid_update_leaves_config_untouched() {
        let engine = engine();
        let before = engine.config();

        let err = engine
            .update_config(&SyncConfigUpdate {
                batch_size: Some(0),
                max_retries: Some(9),
                ..SyncConfigUpdate::default()
            })
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(engine.config(), before);
    }
}

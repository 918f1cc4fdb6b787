//! # Outbox Engine
//!
//! A local-mutation sync engine for offline-capable applications.
//!
//! Client code records create/update/delete intents as operations. The engine
//! queues them, delivers them to a remote store in priority-ordered batches,
//! detects conflicts between local and remote copies, and resolves them by
//! policy or on request.
//!
//! ## Core Concepts
//!
//! ### Operations
//!
//! A [`SyncOperation`] is one queued mutation. Its lifecycle:
//!
//! - `pending` - waiting for a pass
//! - `syncing` - being sent
//! - `completed` - accepted by the remote store (terminal)
//! - `failed` - retries exhausted (terminal)
//! - `conflict` - the remote holds a diverging copy
//!
//! ### Passes
//!
//! [`SyncEngine::run_sync_pass`] selects eligible operations, orders them by
//! [`Priority`], and sends them `batchSize` at a time. Operations inside a
//! batch run concurrently; batches run one after another. Only one pass runs
//! at a time.
//!
//! ### Conflicts
//!
//! When the remote reports a conflict, a [`SyncConflict`] is recorded and
//! classified as [`ConflictType::Data`], [`ConflictType::Version`], or
//! [`ConflictType::Deletion`]. Conflicts that only touch non-critical fields
//! are resolved automatically under the `auto` and `hybrid` policies; the
//! rest wait for [`SyncEngine::resolve_conflict`] with a
//! [`ResolutionStrategy`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use outbox_engine::{NewOperation, Priority, RemoteStore, SyncConfig, SyncEngine};
//! use serde_json::json;
//!
//! # async fn example(remote: Arc<dyn RemoteStore>) -> outbox_engine::error::Result<()> {
//! let engine = SyncEngine::new(remote, SyncConfig::default())?;
//!
//! let id = engine
//!     .enqueue(
//!         NewOperation::update("bookings", "b-42", json!({"status": "confirmed"}))
//!             .with_priority(Priority::High),
//!     )
//!     .await;
//!
//! let stats = engine.run_sync_pass().await?;
//! println!("{} of {} synced", stats.completed, stats.total);
//!
//! // Or let the scheduler run passes every `syncInterval` minutes.
//! let _scheduler = engine.start_auto_sync();
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod events;
pub mod operation;
pub mod queue;
pub mod remote;
pub mod resolve;
pub mod scheduler;
pub mod stats;

// Re-export main types at crate root
pub use config::{ConflictPolicy, SyncConfig, SyncConfigUpdate, SyncPriority};
pub use conflict::{ConflictType, SyncConflict, CRITICAL_FIELDS};
pub use engine::SyncEngine;
pub use error::Error;
pub use events::{EventBus, SyncEvent};
pub use operation::{
    ConflictData, NewOperation, OperationId, OperationKind, OperationStatus, Priority,
    SyncOperation,
};
pub use queue::OperationFilter;
pub use remote::{RemoteError, RemoteReply, RemoteResponse, RemoteStore};
pub use resolve::{ResolutionStrategy, SYSTEM_FIELDS};
pub use scheduler::AutoSyncScheduler;
pub use stats::SyncStats;

/// Type aliases for clarity
pub type EntityType = String;
pub type EntityId = String;
pub type ConflictId = String;
/// Milliseconds since the Unix epoch
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`].
pub fn now_millis() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

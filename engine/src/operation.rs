//! Operation types for expressing queued mutations.
//!
//! Changes made by the host application are captured as operations and held
//! in the queue until a sync pass delivers them to the remote store.

use crate::{EntityId, EntityType, Timestamp};
use serde::{Deserialize, Serialize};

/// Unique identifier for an operation.
pub type OperationId = String;

/// The mutation an operation carries to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// Lifecycle state of an operation.
///
/// ```text
/// pending -> syncing -> completed
///               |-----> pending   (retry left)
///               |-----> failed    (retries exhausted)
///               `-----> conflict -> pending (resolved)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Syncing,
    Completed,
    Failed,
    Conflict,
}

impl OperationStatus {
    /// Whether the status can no longer change through sync passes.
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }
}

/// Dispatch priority. Higher priorities are sent first within a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Ordering weight used by the executor.
    pub fn weight(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

/// Snapshot of both sides attached to an operation while it is in conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictData {
    pub local: serde_json::Value,
    pub remote: serde_json::Value,
    pub last_sync: Timestamp,
}

/// A queued mutation and its sync state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Engine-assigned identifier
    pub id: OperationId,
    /// Mutation kind
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Remote entity collection, e.g. `"bookings"`
    pub entity_type: EntityType,
    /// Target entity; absent for creates whose id the remote assigns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    /// Payload sent to the remote store
    pub local_data: serde_json::Value,
    /// Last known remote snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_data: Option<serde_json::Value>,
    pub status: OperationStatus,
    pub priority: Priority,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_data: Option<ConflictData>,
    /// Message of the most recent failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl SyncOperation {
    /// Whether a sync pass may pick this operation up.
    ///
    /// Only `pending` qualifies. An operation is marked `failed` once its
    /// retries are exhausted, and stays there until requeued.
    pub fn is_eligible(&self) -> bool {
        matches!(self.status, OperationStatus::Pending)
    }
}

/// Caller input for [`crate::SyncEngine::enqueue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub entity_type: EntityType,
    #[serde(default)]
    pub entity_id: Option<EntityId>,
    #[serde(default)]
    pub local_data: serde_json::Value,
    #[serde(default)]
    pub remote_data: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Priority,
    /// Overrides the engine-wide retry limit
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl NewOperation {
    /// Create an operation for a new entity.
    pub fn create(entity_type: impl Into<EntityType>, data: serde_json::Value) -> Self {
        Self {
            kind: OperationKind::Create,
            entity_type: entity_type.into(),
            entity_id: None,
            local_data: data,
            remote_data: None,
            priority: Priority::default(),
            max_retries: None,
        }
    }

    /// Create an operation replacing an existing entity.
    pub fn update(
        entity_type: impl Into<EntityType>,
        entity_id: impl Into<EntityId>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            kind: OperationKind::Update,
            entity_type: entity_type.into(),
            entity_id: Some(entity_id.into()),
            local_data: data,
            remote_data: None,
            priority: Priority::default(),
            max_retries: None,
        }
    }

    /// Create an operation removing an entity.
    pub fn delete(entity_type: impl Into<EntityType>, entity_id: impl Into<EntityId>) -> Self {
        Self {
            kind: OperationKind::Delete,
            entity_type: entity_type.into(),
            entity_id: Some(entity_id.into()),
            local_data: serde_json::Value::Null,
            remote_data: None,
            priority: Priority::default(),
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_remote_data(mut self, remote: serde_json::Value) -> Self {
        self.remote_data = Some(remote);
        self
    }

    /// Build the queued record.
    pub(crate) fn into_operation(
        self,
        id: OperationId,
        default_max_retries: u32,
        now: Timestamp,
    ) -> SyncOperation {
        SyncOperation {
            id,
            kind: self.kind,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            local_data: self.local_data,
            remote_data: self.remote_data,
            status: OperationStatus::Pending,
            priority: self.priority,
            retry_count: 0,
            max_retries: self.max_retries.unwrap_or(default_max_retries),
            conflict_data: None,
            error: None,
            created_at: now,
            completed_at: None,
        }
    }
}

impl From<&SyncOperation> for NewOperation {
    fn from(op: &SyncOperation) -> Self {
        Self {
            kind: op.kind,
            entity_type: op.entity_type.clone(),
            entity_id: op.entity_id.clone(),
            local_data: op.local_data.clone(),
            remote_data: op.remote_data.clone(),
            priority: op.priority,
            max_retries: Some(op.max_retries),
        }
    }
}

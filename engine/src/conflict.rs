//! Conflict detection, classification, and the registry of live conflicts.

use crate::{
    error::Result, queue::OperationQueue, ConflictData, ConflictId, EntityId, EntityType, Error,
    OperationId, OperationStatus, SyncOperation, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Fields whose disagreement forces a manual resolution.
pub const CRITICAL_FIELDS: [&str; 5] = ["id", "status", "amount", "startDate", "endDate"];

/// Field carrying the entity version marker.
pub const VERSION_FIELD: &str = "version";

/// Kind of disagreement between the local and remote copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    /// Payloads differ
    Data,
    /// Version markers differ
    Version,
    /// The entity no longer exists remotely
    Deletion,
}

/// A detected disagreement for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub id: ConflictId,
    pub operation_id: OperationId,
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    pub local_data: Value,
    /// `null` when the entity was deleted remotely
    pub remote_data: Value,
    pub last_sync_timestamp: Timestamp,
    pub conflict_type: ConflictType,
    pub auto_resolvable: bool,
    pub detected_at: Timestamp,
}

impl SyncConflict {
    /// Build a conflict for `op` from a remote conflict reply.
    pub fn detect(op: &SyncOperation, remote: Value, last_sync: Timestamp, now: Timestamp) -> Self {
        let conflict_type = classify(&op.local_data, &remote);
        let auto_resolvable = is_auto_resolvable(&op.local_data, &remote);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation_id: op.id.clone(),
            entity_type: op.entity_type.clone(),
            entity_id: op.entity_id.clone(),
            local_data: op.local_data.clone(),
            remote_data: remote,
            last_sync_timestamp: last_sync,
            conflict_type,
            auto_resolvable,
            detected_at: now,
        }
    }
}

/// Classify a conflict at detection time.
pub fn classify(local: &Value, remote: &Value) -> ConflictType {
    if remote.is_null() {
        return ConflictType::Deletion;
    }

    match (local.get(VERSION_FIELD), remote.get(VERSION_FIELD)) {
        (Some(local_version), Some(remote_version)) if local_version != remote_version => {
            ConflictType::Version
        }
        _ => ConflictType::Data,
    }
}

/// True when every critical field agrees. A field missing on both sides agrees.
pub fn is_auto_resolvable(local: &Value, remote: &Value) -> bool {
    CRITICAL_FIELDS
        .iter()
        .all(|field| local.get(field) == remote.get(field))
}

/// Live conflicts, at most one per operation.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConflictRegistry {
    conflicts: HashMap<ConflictId, SyncConflict>,
    by_operation: HashMap<OperationId, ConflictId>,
    order: Vec<ConflictId>,
}

impl ConflictRegistry {
    /// Store a conflict and move its operation into `conflict` status.
    ///
    /// A previous conflict for the same operation is replaced.
    pub fn record(&mut self, queue: &mut OperationQueue, conflict: SyncConflict) -> Result<()> {
        let op = queue
            .get_mut(&conflict.operation_id)
            .ok_or_else(|| Error::OperationNotFound(conflict.operation_id.clone()))?;

        op.status = OperationStatus::Conflict;
        op.remote_data = Some(conflict.remote_data.clone());
        op.conflict_data = Some(ConflictData {
            local: conflict.local_data.clone(),
            remote: conflict.remote_data.clone(),
            last_sync: conflict.last_sync_timestamp,
        });

        if let Some(previous) = self
            .by_operation
            .insert(conflict.operation_id.clone(), conflict.id.clone())
        {
            self.conflicts.remove(&previous);
            self.order.retain(|id| id != &previous);
        }

        self.order.push(conflict.id.clone());
        self.conflicts.insert(conflict.id.clone(), conflict);
        Ok(())
    }

    /// Remove a conflict and return its operation to `pending` with `resolved` as payload.
    pub fn resolve(
        &mut self,
        queue: &mut OperationQueue,
        conflict_id: &str,
        resolved: Value,
    ) -> Result<SyncConflict> {
        let operation_id = self
            .conflicts
            .get(conflict_id)
            .map(|c| c.operation_id.clone())
            .ok_or_else(|| Error::ConflictNotFound(conflict_id.to_string()))?;

        let op = queue
            .get_mut(&operation_id)
            .ok_or_else(|| Error::OperationNotFound(operation_id.clone()))?;
        op.local_data = resolved;
        op.status = OperationStatus::Pending;
        op.conflict_data = None;

        self.by_operation.remove(&operation_id);
        self.order.retain(|id| id != conflict_id);
        self.conflicts
            .remove(conflict_id)
            .ok_or_else(|| Error::ConflictNotFound(conflict_id.to_string()))
    }

    pub fn get(&self, conflict_id: &str) -> Option<&SyncConflict> {
        self.conflicts.get(conflict_id)
    }

    /// All live conflicts, most recent first.
    pub fn list(&self) -> Vec<SyncConflict> {
        let mut conflicts: Vec<(usize, &SyncConflict)> = self
            .order
            .iter()
            .filter_map(|id| self.conflicts.get(id))
            .enumerate()
            .collect();

        conflicts.sort_by(|(pos_a, a), (pos_b, b)| {
            b.detected_at
                .cmp(&a.detected_at)
                .then_with(|| pos_b.cmp(pos_a))
        });

        conflicts.into_iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewOperation;
    use serde_json::json;

    fn queued(queue: &mut OperationQueue, id: &str, data: Value) -> SyncOperation {
        let op = NewOperation::update("bookings", "b-1", data).into_operation(id.into(), 3, 0);
        queue.insert(op.clone());
        op
    }

    #[test]
    fn classify_deletion() {
        assert_eq!(
            classify(&json!({"id": "b-1"}), &Value::Null),
            ConflictType::Deletion
        );
    }

    #[test]
    fn classify_version() {
        let local = json!({"id": "b-1", "version": 2});
        let remote = json!({"id": "b-1", "version": 3});
        assert_eq!(classify(&local, &remote), ConflictType::Version);
    }

    #[test]
    fn classify_data_when_versions_match_or_missing() {
        let local = json!({"id": "b-1", "version": 3, "note": "a"});
        let remote = json!({"id": "b-1", "version": 3, "note": "b"});
        assert_eq!(classify(&local, &remote), ConflictType::Data);

        let local = json!({"id": "b-1", "version": 3});
        let remote = json!({"id": "b-1"});
        assert_eq!(classify(&local, &remote), ConflictType::Data);
    }

    #[test]
    fn critical_field_difference_is_not_auto_resolvable() {
        let local = json!({"id": "b-1", "status": "confirmed", "description": "x"});
        let remote = json!({"id": "b-1", "status": "cancelled", "description": "x"});
        assert!(!is_auto_resolvable(&local, &remote));
    }

    #[test]
    fn non_critical_difference_is_auto_resolvable() {
        let local = json!({"id": "b-1", "status": "confirmed", "description": "new"});
        let remote = json!({"id": "b-1", "status": "confirmed", "description": "old"});
        assert!(is_auto_resolvable(&local, &remote));
    }

    #[test]
    fn missing_critical_field_on_one_side_counts_as_difference() {
        let local = json!({"id": "b-1", "amount": 10});
        let remote = json!({"id": "b-1"});
        assert!(!is_auto_resolvable(&local, &remote));
    }

    #[test]
    fn record_marks_operation() {
        let mut queue = OperationQueue::default();
        let mut registry = ConflictRegistry::default();
        let op = queued(&mut queue, "op-1", json!({"id": "b-1", "status": "a"}));

        let conflict = SyncConflict::detect(&op, json!({"id": "b-1", "status": "b"}), 500, 1000);
        let conflict_id = conflict.id.clone();
        registry.record(&mut queue, conflict).unwrap();

        let stored = queue.get("op-1").unwrap();
        assert_eq!(stored.status, OperationStatus::Conflict);
        let data = stored.conflict_data.as_ref().unwrap();
        assert_eq!(data.remote["status"], "b");
        assert_eq!(data.last_sync, 500);
        assert_eq!(registry.get(&conflict_id).unwrap().operation_id, "op-1");
    }

    #[test]
    fn record_keeps_one_conflict_per_operation() {
        let mut queue = OperationQueue::default();
        let mut registry = ConflictRegistry::default();
        let op = queued(&mut queue, "op-1", json!({"id": "b-1"}));

        let first = SyncConflict::detect(&op, json!({"id": "b-1", "x": 1}), 0, 1);
        let first_id = first.id.clone();
        registry.record(&mut queue, first).unwrap();
        let second = SyncConflict::detect(&op, json!({"id": "b-1", "x": 2}), 0, 2);
        registry.record(&mut queue, second).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&first_id).is_none());
    }

    #[test]
    fn resolve_restores_pending() {
        let mut queue = OperationQueue::default();
        let mut registry = ConflictRegistry::default();
        let op = queued(&mut queue, "op-1", json!({"id": "b-1"}));
        let conflict = SyncConflict::detect(&op, json!({"id": "b-1", "x": 1}), 0, 1);
        let conflict_id = conflict.id.clone();
        registry.record(&mut queue, conflict).unwrap();

        let removed = registry
            .resolve(&mut queue, &conflict_id, json!({"id": "b-1", "x": 9}))
            .unwrap();
        assert_eq!(removed.id, conflict_id);
        assert_eq!(registry.len(), 0);

        let stored = queue.get("op-1").unwrap();
        assert_eq!(stored.status, OperationStatus::Pending);
        assert_eq!(stored.local_data["x"], 9);
        assert!(stored.conflict_data.is_none());
    }

    #[test]
    fn resolve_unknown_conflict() {
        let mut queue = OperationQueue::default();
        let mut registry = ConflictRegistry::default();
        let err = registry
            .resolve(&mut queue, "missing", Value::Null)
            .unwrap_err();
        assert_eq!(err, Error::ConflictNotFound("missing".into()));
    }

    #[test]
    fn list_is_most_recent_first() {
        let mut queue = OperationQueue::default();
        let mut registry = ConflictRegistry::default();
        let a = queued(&mut queue, "op-a", json!({}));
        let b = queued(&mut queue, "op-b", json!({}));

        registry
            .record(&mut queue, SyncConflict::detect(&a, json!({}), 0, 10))
            .unwrap();
        registry
            .record(&mut queue, SyncConflict::detect(&b, json!({}), 0, 20))
            .unwrap();

        let ops: Vec<_> = registry
            .list()
            .into_iter()
            .map(|c| c.operation_id)
            .collect();
        assert_eq!(ops, vec!["op-b", "op-a"]);
    }
}

//! Operation queue - the single source of truth for queued work.
//!
//! Operations keep their insertion position for the lifetime of the queue so
//! that priority ties resolve in enqueue order.

use crate::{EntityType, OperationId, OperationStatus, Priority, SyncOperation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Optional filters for listing operations. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFilter {
    #[serde(default)]
    pub statuses: Option<Vec<OperationStatus>>,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub priorities: Option<Vec<Priority>>,
}

impl OperationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: OperationStatus) -> Self {
        self.statuses.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn entity_type(mut self, entity_type: impl Into<EntityType>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priorities.get_or_insert_with(Vec::new).push(priority);
        self
    }

    /// Check whether an operation passes every set filter.
    pub fn matches(&self, op: &SyncOperation) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&op.status) {
                return false;
            }
        }
        if let Some(entity_type) = &self.entity_type {
            if &op.entity_type != entity_type {
                return false;
            }
        }
        if let Some(priorities) = &self.priorities {
            if !priorities.contains(&op.priority) {
                return false;
            }
        }
        true
    }
}

/// Addressable, insertion-ordered collection of operations.
#[derive(Debug, Clone, Default)]
pub(crate) struct OperationQueue {
    operations: HashMap<OperationId, SyncOperation>,
    /// Insertion order of live operation ids
    order: Vec<OperationId>,
}

impl OperationQueue {
    /// Store a new operation at the back of the queue.
    pub fn insert(&mut self, op: SyncOperation) {
        self.order.push(op.id.clone());
        self.operations.insert(op.id.clone(), op);
    }

    pub fn get(&self, id: &str) -> Option<&SyncOperation> {
        self.operations.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SyncOperation> {
        self.operations.get_mut(id)
    }

    /// Operations in enqueue order.
    pub fn iter(&self) -> impl Iterator<Item = &SyncOperation> {
        self.order.iter().filter_map(|id| self.operations.get(id))
    }

    /// Matching operations, most recent first.
    pub fn list(&self, filter: &OperationFilter) -> Vec<SyncOperation> {
        let mut matching: Vec<(usize, &SyncOperation)> = self
            .iter()
            .enumerate()
            .filter(|(_, op)| filter.matches(op))
            .collect();

        matching.sort_by(|(pos_a, a), (pos_b, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| pos_b.cmp(pos_a))
        });

        matching.into_iter().map(|(_, op)| op.clone()).collect()
    }

    /// Ids of operations a pass may pick up, in enqueue order.
    pub fn eligible(&self) -> Vec<(OperationId, Priority)> {
        self.iter()
            .filter(|op| op.is_eligible())
            .map(|op| (op.id.clone(), op.priority))
            .collect()
    }

    /// Drop all completed operations, returning how many were removed.
    pub fn remove_completed(&mut self) -> usize {
        let before = self.operations.len();
        self.operations
            .retain(|_, op| op.status != OperationStatus::Completed);
        let operations = &self.operations;
        self.order.retain(|id| operations.contains_key(id));
        before - self.operations.len()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn count(&self, status: OperationStatus) -> usize {
        self.operations
            .values()
            .filter(|op| op.status == status)
            .count()
    }
}

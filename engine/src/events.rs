//! Engine event broadcasting.
//!
//! Events are fire-and-forget: publishing never waits for listeners and
//! succeeds even when nobody is subscribed.

use crate::{ConflictId, OperationId, ResolutionStrategy, SyncConflict, SyncOperation, SyncStats};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notifications published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    OperationQueued {
        id: OperationId,
        operation: SyncOperation,
    },
    ConflictDetected {
        conflict_id: ConflictId,
        conflict: SyncConflict,
    },
    ConflictResolved {
        conflict_id: ConflictId,
        operation_id: OperationId,
        strategy: ResolutionStrategy,
    },
    SyncCompleted {
        stats: SyncStats,
    },
}

/// Broadcast channel for [`SyncEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event, returning how many subscribers received it.
    pub fn publish(&self, event: SyncEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(
            bus.publish(SyncEvent::SyncCompleted {
                stats: SyncStats::default()
            }),
            0
        );
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(4);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let sent = bus.publish(SyncEvent::SyncCompleted {
            stats: SyncStats::default(),
        });
        assert_eq!(sent, 2);

        assert!(matches!(
            rx1.recv().await.unwrap(),
            SyncEvent::SyncCompleted { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            SyncEvent::SyncCompleted { .. }
        ));
    }

    #[test]
    fn event_serialization() {
        let event = SyncEvent::ConflictResolved {
            conflict_id: "c-1".into(),
            operation_id: "op-1".into(),
            strategy: ResolutionStrategy::Merge,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "conflict_resolved");
        assert_eq!(json["conflict_id"], "c-1");
        assert_eq!(json["strategy"], "merge");
    }
}

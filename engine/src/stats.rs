//! Aggregate sync health.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Counts over the current queue and conflict registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub total: usize,
    pub pending: usize,
    pub syncing: usize,
    pub completed: usize,
    pub failed: usize,
    pub conflicts: usize,
    pub sync_in_progress: bool,
    /// `completed / total`, or `1.0` for an empty queue
    pub success_rate: f64,
    /// End of the most recent finished pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<Timestamp>,
}

impl SyncStats {
    pub fn success_rate(completed: usize, total: usize) -> f64 {
        if total == 0 {
            1.0
        } else {
            completed as f64 / total as f64
        }
    }
}

impl Default for SyncStats {
    fn default() -> Self {
        Self {
            total: 0,
            pending: 0,
            syncing: 0,
            completed: 0,
            failed: 0,
            conflicts: 0,
            sync_in_progress: false,
            success_rate: 1.0,
            last_sync_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_of_empty_queue_is_one() {
        assert_eq!(SyncStats::success_rate(0, 0), 1.0);
        assert_eq!(SyncStats::default().success_rate, 1.0);
    }

    #[test]
    fn success_rate_ratio() {
        assert_eq!(SyncStats::success_rate(1, 4), 0.25);
        assert_eq!(SyncStats::success_rate(3, 3), 1.0);
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_value(SyncStats::default()).unwrap();
        assert_eq!(json["syncInProgress"], false);
        assert_eq!(json["successRate"], 1.0);
        assert!(json.get("lastSyncAt").is_none());
    }
}

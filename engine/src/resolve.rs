//! Conflict resolution strategies.
//!
//! A strategy turns a [`SyncConflict`] into the payload the operation is
//! re-sent with. Resolution itself is pure; the engine applies the result
//! and re-syncs the operation.

use crate::{conflict::VERSION_FIELD, ConflictType, SyncConflict};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields owned by the remote store. `merge` always takes these from remote.
pub const SYSTEM_FIELDS: [&str; 4] = ["id", "createdAt", "updatedAt", VERSION_FIELD];

/// How to settle a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Keep the local payload
    LocalWins,
    /// Adopt the remote payload
    RemoteWins,
    /// Local payload with system fields taken from remote
    Merge,
    /// Accept deletions, otherwise the most recently modified side wins
    Auto,
}

/// Compute the resolved payload for a conflict.
pub fn resolve_value(conflict: &SyncConflict, strategy: ResolutionStrategy) -> Value {
    match strategy {
        ResolutionStrategy::LocalWins => conflict.local_data.clone(),
        ResolutionStrategy::RemoteWins => conflict.remote_data.clone(),
        ResolutionStrategy::Merge => merge(&conflict.local_data, &conflict.remote_data),
        ResolutionStrategy::Auto => auto(conflict),
    }
}

fn merge(local: &Value, remote: &Value) -> Value {
    let mut merged = local.clone();
    if let (Some(target), Some(source)) = (merged.as_object_mut(), remote.as_object()) {
        for field in SYSTEM_FIELDS {
            if let Some(value) = source.get(field) {
                target.insert(field.to_string(), value.clone());
            }
        }
    }
    merged
}

fn auto(conflict: &SyncConflict) -> Value {
    if conflict.conflict_type == ConflictType::Deletion {
        return Value::Null;
    }

    // Ties go to the remote copy.
    if last_modified(&conflict.local_data) > last_modified(&conflict.remote_data) {
        conflict.local_data.clone()
    } else {
        conflict.remote_data.clone()
    }
}

/// Latest of `updatedAt` / `createdAt`, in milliseconds since the epoch.
pub fn last_modified(data: &Value) -> Option<i64> {
    ["updatedAt", "createdAt"]
        .iter()
        .filter_map(|field| data.get(field).and_then(parse_timestamp))
        .max()
}

/// Accepts epoch milliseconds or RFC 3339 strings.
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis())
            .or_else(|| s.parse().ok()),
        _ => None,
    }
}

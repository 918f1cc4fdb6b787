//! Contract with the remote store the engine reconciles against.
//!
//! The engine never performs IO itself; every network round trip goes through
//! a [`RemoteStore`] implementation supplied by the host.

use crate::{OperationKind, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure talking to the remote store. Always treated as transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid remote response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Outcome of a successful round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteReply {
    /// The remote accepted the change
    Applied { data: Option<Value> },
    /// The remote holds a diverging copy; `remote` is `null` if it was deleted
    Conflict { remote: Value, last_sync: Timestamp },
}

/// Wire shape of a remote reply: `{data}` or `{conflict: true, remote, lastSync}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub conflict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<Timestamp>,
}

impl RemoteResponse {
    pub fn applied(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn conflict(remote: Option<Value>, last_sync: Timestamp) -> Self {
        Self {
            conflict: true,
            remote,
            last_sync: Some(last_sync),
            ..Self::default()
        }
    }
}

impl From<RemoteResponse> for RemoteReply {
    fn from(response: RemoteResponse) -> Self {
        if response.conflict {
            RemoteReply::Conflict {
                remote: response.remote.unwrap_or(Value::Null),
                last_sync: response.last_sync.unwrap_or_default(),
            }
        } else {
            RemoteReply::Applied {
                data: response.data,
            }
        }
    }
}

/// Remote persistence for each entity type.
///
/// Timeouts are the implementation's responsibility.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create(&self, entity_type: &str, data: &Value) -> Result<RemoteReply, RemoteError>;

    async fn update(
        &self,
        entity_type: &str,
        entity_id: &str,
        data: &Value,
    ) -> Result<RemoteReply, RemoteError>;

    async fn delete(&self, entity_type: &str, entity_id: &str)
        -> Result<RemoteReply, RemoteError>;
}

/// Everything needed to send one operation, detached from the queue.
#[derive(Debug, Clone)]
pub(crate) struct Dispatch {
    pub kind: OperationKind,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub data: Value,
}

impl Dispatch {
    /// Route to the remote endpoint matching the operation kind.
    pub async fn send(&self, remote: &dyn RemoteStore) -> Result<RemoteReply, RemoteError> {
        match self.kind {
            OperationKind::Create => remote.create(&self.entity_type, &self.data).await,
            OperationKind::Update => {
                let id = self.require_entity_id()?;
                remote.update(&self.entity_type, id, &self.data).await
            }
            OperationKind::Delete => {
                let id = self.require_entity_id()?;
                remote.delete(&self.entity_type, id).await
            }
        }
    }

    fn require_entity_id(&self) -> Result<&str, RemoteError> {
        self.entity_id.as_deref().ok_or_else(|| {
            RemoteError::InvalidRequest(format!("{:?} requires an entity id", self.kind))
        })
    }
}

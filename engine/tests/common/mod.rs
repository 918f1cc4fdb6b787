//! Scripted remote store shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use outbox_engine::{OperationKind, RemoteError, RemoteReply, RemoteStore};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// One call received by the remote.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: OperationKind,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub data: Value,
}

type Reply = Result<RemoteReply, RemoteError>;

/// Remote that replays scripted replies per key and accepts everything else.
///
/// Scripts are keyed by entity id, or by entity type for creates.
#[derive(Default)]
pub struct ScriptedRemote {
    calls: Mutex<Vec<Call>>,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    delay: Option<Duration>,
    gate: Option<Semaphore>,
    started: Notify,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before replying.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every call blocks until [`ScriptedRemote::release`] hands out a permit.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    /// Wait until at least one call has started.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn script(&self, key: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn fail(&self, key: &str, times: usize) {
        self.script(
            key,
            (0..times)
                .map(|_| Err(RemoteError::Transport("connection reset".into())))
                .collect(),
        );
    }

    pub fn conflict(&self, key: &str, remote: Value) {
        self.script(
            key,
            vec![Ok(RemoteReply::Conflict {
                remote,
                last_sync: 1_706_745_600_000,
            })],
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(
        &self,
        kind: OperationKind,
        entity_type: &str,
        entity_id: Option<&str>,
        data: &Value,
    ) -> Reply {
        self.calls.lock().unwrap().push(Call {
            kind,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(str::to_string),
            data: data.clone(),
        });
        self.started.notify_one();

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = entity_id.unwrap_or(entity_type);
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front);

        scripted.unwrap_or_else(|| {
            Ok(RemoteReply::Applied {
                data: match kind {
                    OperationKind::Delete => None,
                    _ => Some(data.clone()),
                },
            })
        })
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn create(&self, entity_type: &str, data: &Value) -> Reply {
        self.respond(OperationKind::Create, entity_type, None, data)
            .await
    }

    async fn update(&self, entity_type: &str, entity_id: &str, data: &Value) -> Reply {
        self.respond(OperationKind::Update, entity_type, Some(entity_id), data)
            .await
    }

    async fn delete(&self, entity_type: &str, entity_id: &str) -> Reply {
        self.respond(OperationKind::Delete, entity_type, Some(entity_id), &Value::Null)
            .await
    }
}

/// A booking payload with every critical field set.
pub fn booking(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "amount": 120,
        "startDate": "2024-06-01",
        "endDate": "2024-06-05",
        "description": "Sea view room",
        "updatedAt": "2024-05-01T10:00:00Z"
    })
}

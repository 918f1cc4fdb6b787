//! [`RemoteStore`] over HTTP.
//!
//! Endpoints, relative to the configured base URL:
//!
//! - create: `POST   {base}/{entityType}`
//! - update: `PUT    {base}/{entityType}/{entityId}`
//! - delete: `DELETE {base}/{entityType}/{entityId}`
//!
//! A 2xx or 409 response body is decoded as `{data}` or
//! `{conflict: true, remote, lastSync}`. Any other status is a rejection.

use async_trait::async_trait;
use outbox_engine::{RemoteError, RemoteReply, RemoteResponse, RemoteStore};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;

/// HTTP client for the remote store.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
}

impl HttpRemote {
    /// Create a client with a per-request `timeout`.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidRequest("remote URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<RemoteReply, RemoteError> {
        tracing::debug!(%method, %url, "Sending request to remote store");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        decode(status, &bytes)
    }
}

fn decode(status: StatusCode, body: &[u8]) -> Result<RemoteReply, RemoteError> {
    if status == StatusCode::CONFLICT {
        let mut response: RemoteResponse =
            serde_json::from_slice(body).map_err(|e| RemoteError::Decode(e.to_string()))?;
        response.conflict = true;
        return Ok(response.into());
    }

    if !status.is_success() {
        return Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: String::from_utf8_lossy(body).into_owned(),
        });
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RemoteReply::Applied { data: None });
    }

    serde_json::from_slice::<RemoteResponse>(body)
        .map(RemoteReply::from)
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn create(&self, entity_type: &str, data: &Value) -> Result<RemoteReply, RemoteError> {
        let url = self.endpoint(&[entity_type])?;
        self.send(Method::POST, url, Some(data)).await
    }

    async fn update(
        &self,
        entity_type: &str,
        entity_id: &str,
        data: &Value,
    ) -> Result<RemoteReply, RemoteError> {
        let url = self.endpoint(&[entity_type, entity_id])?;
        self.send(Method::PUT, url, Some(data)).await
    }

    async fn delete(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<RemoteReply, RemoteError> {
        let url = self.endpoint(&[entity_type, entity_id])?;
        self.send(Method::DELETE, url, None).await
    }
}

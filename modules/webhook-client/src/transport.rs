// Transport boundary for webhook delivery.
//
// The dispatcher owns validation, retries and timeouts; a transport only
// performs one POST. Production uses reqwest; tests script replies with
// MockTransport.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::error::{Result, WebhookError};

/// Status and body of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<TransportResponse>;
}

// ---------------------------------------------------------------------------
// ReqwestTransport (production)
// ---------------------------------------------------------------------------

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<TransportResponse> {
        let resp = self
            .client
            .post(url.clone())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

// ---------------------------------------------------------------------------
// MockTransport (for tests)
// ---------------------------------------------------------------------------

/// Scripted reply for one attempt.
#[derive(Debug, Clone)]
pub enum MockReply {
    Status(u16),
    NetworkError,
    /// Never answers; only a timeout ends the attempt.
    Hang,
}

/// Replays scripted replies in order and records every request.
/// Once the script runs out every attempt answers 200.
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockTransport {
    pub fn new(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::new([])
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl WebhookTransport for MockTransport {
    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<TransportResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockReply::Status(200));

        match reply {
            MockReply::Status(status) => Ok(TransportResponse {
                status,
                body: String::new(),
            }),
            MockReply::NetworkError => Err(WebhookError::Network("connection reset".to_string())),
            MockReply::Hang => std::future::pending().await,
        }
    }
}

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, TrackingError};

/// A request against the server relay, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorRequest {
    pub path: String,
    pub body: Value,
}

/// Replays browser events through the server-side relay.
#[async_trait]
pub trait ServerMirror: Send + Sync {
    async fn mirror(&self, request: &MirrorRequest) -> Result<()>;
}

/// Posts mirror requests to a running `vfx-api`.
pub struct HttpMirror {
    client: reqwest::Client,
    api_base: String,
}

impl HttpMirror {
    pub fn new(api_base: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ServerMirror for HttpMirror {
    async fn mirror(&self, request: &MirrorRequest) -> Result<()> {
        let url = format!("{}{}", self.api_base, request.path);
        let resp = self.client.post(&url).json(&request.body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TrackingError::Relay {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Records requests; optionally fails every call.
#[derive(Default)]
pub struct MockMirror {
    requests: Mutex<Vec<MirrorRequest>>,
    fail: bool,
}

impl MockMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<MirrorRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerMirror for MockMirror {
    async fn mirror(&self, request: &MirrorRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(TrackingError::Network("connection refused".into()));
        }
        Ok(())
    }
}

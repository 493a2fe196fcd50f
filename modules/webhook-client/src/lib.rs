pub mod error;
pub mod transport;

pub use error::{Result, WebhookError};
pub use transport::{MockReply, MockTransport, ReqwestTransport, TransportResponse, WebhookTransport};

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};
use url::Url;

/// Attempts per dispatch, including the first.
pub const MAX_ATTEMPTS: u32 = 3;
/// Per-attempt deadline. The in-flight request is dropped when it elapses.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
/// Backoff after failed attempt `n` (zero-based) is `BASE_BACKOFF * 2^n`.
pub const BASE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Sleep before the attempt that follows failed attempt `attempt` (zero-based).
    /// Pure exponential, no jitter. Saturates at `Duration::MAX`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_backoff.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            attempt_timeout: ATTEMPT_TIMEOUT,
            base_backoff: BASE_BACKOFF,
        }
    }
}

/// What a successful dispatch took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempts: u32,
    pub status: u16,
}

/// Relays JSON payloads to HTTPS webhooks, all-or-nothing per call.
pub struct WebhookDispatcher {
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
}

impl WebhookDispatcher {
    pub fn new(transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Validate `url`, stamp `created_at` onto the payload and POST it,
    /// retrying non-2xx answers, network errors and timeouts.
    pub async fn dispatch(&self, url: &str, payload: serde_json::Value) -> Result<DeliveryReport> {
        let url = validate_webhook_url(url)?;
        let body = with_created_at(payload);

        let mut last_error = None;
        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.policy.backoff_after(attempt - 1)).await;
            }

            match self.attempt(&url, &body).await {
                Ok(status) => {
                    info!(host = url.host_str(), attempt = attempt + 1, status, "Webhook delivered");
                    return Ok(DeliveryReport {
                        attempts: attempt + 1,
                        status,
                    });
                }
                Err(e) => {
                    warn!(
                        host = url.host_str(),
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Webhook attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(WebhookError::DeliveryFailed {
            attempts: self.policy.max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    async fn attempt(&self, url: &Url, body: &serde_json::Value) -> Result<u16> {
        let resp = tokio::time::timeout(
            self.policy.attempt_timeout,
            self.transport.post_json(url, body),
        )
        .await
        .map_err(|_| WebhookError::Timeout(self.policy.attempt_timeout))??;

        if resp.is_success() {
            Ok(resp.status)
        } else {
            Err(WebhookError::Status {
                status: resp.status,
                body: resp.body,
            })
        }
    }
}

/// Parse `raw` and require the `https` scheme.
pub fn validate_webhook_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| WebhookError::InvalidUrl(raw.to_string()))?;
    if url.scheme() != "https" {
        return Err(WebhookError::InvalidUrl(format!(
            "{raw} (scheme must be https)"
        )));
    }
    if url.host_str().is_none() {
        return Err(WebhookError::InvalidUrl(format!("{raw} (missing host)")));
    }
    Ok(url)
}

/// Insert an ISO-8601 `created_at` into the payload. Non-object payloads
/// are wrapped as `{"data": payload}` first.
pub fn with_created_at(payload: serde_json::Value) -> serde_json::Value {
    let mut obj = match payload {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    obj.insert(
        "created_at".to_string(),
        serde_json::Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    serde_json::Value::Object(obj)
}

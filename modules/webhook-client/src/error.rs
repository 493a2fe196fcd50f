use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebhookError>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Webhook responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Webhook delivery failed after {attempts} attempts: {last_error}")]
    DeliveryFailed { attempts: u32, last_error: String },
}

impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        WebhookError::Network(err.to_string())
    }
}

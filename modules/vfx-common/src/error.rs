use thiserror::Error;

/// Failure taxonomy shared by the relay endpoints.
///
/// Each variant maps to one HTTP status family so handlers never have to
/// decide the status code themselves.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A secret or identifier the endpoint needs is not configured.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request body is missing fields or carries malformed values.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Google or Meta answered with a non-2xx status.
    #[error("Upstream error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    /// Transient failures persisted past the retry budget.
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl RelayError {
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Config(_) => 500,
            RelayError::Validation(_) => 400,
            RelayError::Upstream { status, .. } => *status,
            RelayError::Delivery(_) => 500,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        RelayError::Validation(msg.into())
    }

    pub fn missing_config(key: &str) -> Self {
        RelayError::Config(format!("{key} is not configured"))
    }
}

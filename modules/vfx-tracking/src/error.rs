use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackingError>;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Relay error (status {status}): {message}")]
    Relay { status: u16, message: String },
}

impl From<reqwest::Error> for TrackingError {
    fn from(err: reqwest::Error) -> Self {
        TrackingError::Network(err.to_string())
    }
}

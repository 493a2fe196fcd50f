use thiserror::Error;

pub type Result<T> = std::result::Result<T, Ga4Error>;

#[derive(Debug, Error)]
pub enum Ga4Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

impl From<reqwest::Error> for Ga4Error {
    fn from(err: reqwest::Error) -> Self {
        Ga4Error::Network(err.to_string())
    }
}

impl From<serde_json::Error> for Ga4Error {
    fn from(err: serde_json::Error) -> Self {
        Ga4Error::Parse(err.to_string())
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use ga4_client::Ga4Error;
use meta_capi_client::MetaError;
use vfx_common::RelayError;
use webhook_client::WebhookError;

/// Handler error. Renders a [`RelayError`] as `{ "error": ... }` with the
/// status its variant maps to.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self.0 {
            RelayError::Config(_) | RelayError::Delivery(_) => {
                error!(status = status.as_u16(), error = %self.0, "Relay request failed")
            }
            RelayError::Upstream { .. } | RelayError::Validation(_) => {
                warn!(status = status.as_u16(), error = %self.0, "Relay request rejected")
            }
        }

        let body = match self.0 {
            RelayError::Upstream { status, body } => {
                // Upstream bodies are usually JSON; keep them structured when they are.
                let details = serde_json::from_str::<serde_json::Value>(&body)
                    .unwrap_or(serde_json::Value::String(body));
                json!({ "error": "Upstream request failed", "status": status, "details": details })
            }
            RelayError::Config(msg)
            | RelayError::Validation(msg)
            | RelayError::Delivery(msg) => json!({ "error": msg }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError(err)
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidUrl(url) => {
                ApiError(RelayError::validation(format!("Invalid webhook URL: {url}")))
            }
            other => ApiError(RelayError::Delivery(other.to_string())),
        }
    }
}

impl From<Ga4Error> for ApiError {
    fn from(err: Ga4Error) -> Self {
        match err {
            Ga4Error::Api { status, message } => ApiError(RelayError::Upstream {
                status,
                body: message,
            }),
            Ga4Error::InvalidEvent(msg) => ApiError(RelayError::Validation(msg)),
            other => ApiError(RelayError::Delivery(other.to_string())),
        }
    }
}

impl From<MetaError> for ApiError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::Api { status, message } => ApiError(RelayError::Upstream {
                status,
                body: message,
            }),
            other => ApiError(RelayError::Delivery(other.to_string())),
        }
    }
}

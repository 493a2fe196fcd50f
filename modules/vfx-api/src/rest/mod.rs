pub mod ga4;
pub mod leads;
pub mod meta;
pub mod webhook;

use axum::{response::IntoResponse, Json};

pub async fn api_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Trimmed, non-empty value of an optional body field.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

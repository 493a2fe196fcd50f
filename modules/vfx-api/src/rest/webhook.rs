use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use tracing::info;

use vfx_common::RelayError;
use webhook_client::validate_webhook_url;

use crate::error::ApiResult;
use crate::AppState;

/// `POST /api/webhook` with `{ webhookUrl, ...payload }`. Everything except
/// `webhookUrl` is forwarded.
pub async fn api_webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let Value::Object(mut payload) = body else {
        return Err(RelayError::validation("Body must be a JSON object").into());
    };

    let url = match payload.remove("webhookUrl") {
        Some(Value::String(url)) if !url.trim().is_empty() => url,
        _ => return Err(RelayError::validation("webhookUrl is required").into()),
    };
    validate_webhook_url(&url)?;

    let report = state.webhooks.dispatch(&url, Value::Object(payload)).await?;
    info!(attempts = report.attempts, status = report.status, "Webhook relayed");

    Ok(Json(json!({ "success": true })))
}

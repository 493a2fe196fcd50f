use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use ga4_client::{validate_event_name, Ga4Client, MeasurementEvent, MeasurementPayload};
use vfx_common::{Config, RelayError};

use super::non_empty;
use crate::error::ApiResult;
use crate::AppState;

/// Body of `POST /api/ga4`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ga4EventRequest {
    event_name: Option<String>,
    #[serde(default)]
    params: Map<String, Value>,
    client_id: Option<String>,
    user_id: Option<String>,
    user_properties: Option<Map<String, Value>>,
}

/// Body of `POST /api/ga4/collect`, in Measurement Protocol field naming.
#[derive(Debug, Deserialize)]
pub struct Ga4CollectRequest {
    name: Option<String>,
    #[serde(default)]
    params: Map<String, Value>,
    client_id: Option<String>,
    user_id: Option<String>,
    user_properties: Option<Map<String, Value>>,
}

struct Ga4Forward {
    name: Option<String>,
    params: Map<String, Value>,
    client_id: Option<String>,
    user_id: Option<String>,
    user_properties: Option<Map<String, Value>>,
}

pub async fn api_ga4_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Ga4EventRequest>,
) -> ApiResult<Json<Value>> {
    forward(
        &state,
        Ga4Forward {
            name: body.event_name,
            params: body.params,
            client_id: body.client_id,
            user_id: body.user_id,
            user_properties: body.user_properties,
        },
    )
    .await
}

pub async fn api_ga4_collect(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Ga4CollectRequest>,
) -> ApiResult<Json<Value>> {
    forward(
        &state,
        Ga4Forward {
            name: body.name,
            params: body.params,
            client_id: body.client_id,
            user_id: body.user_id,
            user_properties: body.user_properties,
        },
    )
    .await
}

async fn forward(state: &AppState, req: Ga4Forward) -> ApiResult<Json<Value>> {
    let config = &state.config;
    let measurement_id = Config::require(&config.ga4_measurement_id, "NEXT_PUBLIC_GA4_MEASUREMENT_ID")?;
    let api_secret = Config::require(&config.ga4_api_secret, "GA4_API_SECRET")?;

    let name = non_empty(req.name).ok_or_else(|| RelayError::validation("event name is required"))?;
    let client_id =
        non_empty(req.client_id).ok_or_else(|| RelayError::validation("client id is required"))?;
    // Google decides what it keeps; the relay only flags names it will drop.
    if let Err(e) = validate_event_name(&name) {
        warn!(error = %e, "Forwarding GA4 event Google may discard");
    }

    let payload = MeasurementPayload::single(
        client_id,
        MeasurementEvent {
            name,
            params: req.params,
        },
    )
    .user_id(req.user_id)
    .user_properties(req.user_properties);

    Ga4Client::with_client(state.http.clone(), measurement_id, api_secret)
        .with_base_url(&config.ga4_base_url)
        .send(&payload)
        .await?;

    Ok(Json(json!({ "success": true })))
}

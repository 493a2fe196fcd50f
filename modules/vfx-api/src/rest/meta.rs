use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::Json,
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use meta_capi_client::{
    fbc_from_fbclid, MetaConversionsClient, ServerEvent, UserData, ACTION_SOURCE_WEBSITE,
};
use vfx_common::hashing::{hash_user_data, UserIdentity};
use vfx_common::types::now_ms;
use vfx_common::{Config, RelayError};

use super::non_empty;
use crate::cookies::Visitor;
use crate::error::ApiResult;
use crate::AppState;

/// Body of `POST /api/meta-conversions`. `user_data` carries plain
/// identifiers; they are hashed here.
#[derive(Debug, Deserialize)]
pub struct MetaEventRequest {
    event_name: Option<String>,
    event_time: Option<i64>,
    event_id: Option<String>,
    event_source_url: Option<String>,
    action_source: Option<String>,
    #[serde(default)]
    user_data: UserIdentity,
    custom_data: Option<Map<String, Value>>,
}

pub async fn api_meta_conversions(
    State(state): State<Arc<AppState>>,
    Extension(visitor): Extension<Visitor>,
    headers: HeaderMap,
    Json(body): Json<MetaEventRequest>,
) -> ApiResult<Json<Value>> {
    let config = &state.config;
    let pixel_id = Config::require(&config.facebook_pixel_id, "FACEBOOK_PIXEL_ID")?;
    let access_token = Config::require(&config.meta_api_access_token, "META_API_ACCESS_TOKEN")?;

    let event_name =
        non_empty(body.event_name).ok_or_else(|| RelayError::validation("event_name is required"))?;

    let event_source_url = non_empty(body.event_source_url).or_else(|| {
        headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });

    let user_data = merge_user_data(body.user_data, &visitor, event_source_url.as_deref());
    let event = ServerEvent {
        event_name,
        event_time: body
            .event_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        event_id: non_empty(body.event_id),
        event_source_url,
        action_source: non_empty(body.action_source)
            .unwrap_or_else(|| ACTION_SOURCE_WEBSITE.to_string()),
        user_data,
        custom_data: body.custom_data.filter(|c| !c.is_empty()),
    };
    debug!(event_name = %event.event_name, event_id = ?event.event_id, "Relaying Meta event");

    let response = MetaConversionsClient::new(pixel_id, access_token, &config.meta_api_version)
        .with_client(state.http.clone())
        .with_base_url(&config.meta_graph_base_url)
        .with_test_event_code(config.meta_test_event_code.clone())
        .send_events(std::slice::from_ref(&event))
        .await?;

    Ok(Json(json!({
        "success": true,
        "events_received": response.events_received,
        "fbtrace_id": response.fbtrace_id,
    })))
}

/// Hash the body's identifiers and add what the request itself knows: the
/// visitor's external id, IP, user agent and Meta click/browser cookies.
/// Values sent in the body win over cookie-derived ones. Without an `_fbc`
/// cookie, an `fbclid` on the landing URL stands in for it.
fn merge_user_data(
    mut identity: UserIdentity,
    visitor: &Visitor,
    event_source_url: Option<&str>,
) -> UserData {
    if non_empty(identity.external_id.clone()).is_none() {
        identity.external_id = Some(visitor.external_id.clone());
    }

    let fbc = visitor
        .fbc
        .clone()
        .or_else(|| fbclid(event_source_url?).map(|id| fbc_from_fbclid(&id, now_ms())));

    UserData {
        hashed: hash_user_data(&identity),
        client_ip_address: visitor.client_ip.clone(),
        client_user_agent: visitor.user_agent.clone(),
        fbp: visitor.fbp.clone(),
        fbc,
    }
}

fn fbclid(page_url: &str) -> Option<String> {
    let url = url::Url::parse(page_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "fbclid")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vfx_common::hashing::HashedUserData;

pub const ACTION_SOURCE_WEBSITE: &str = "website";

/// `user_data` of a server event: hashed identifiers plus the unhashed
/// browser context Meta expects in the clear.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(flatten)]
    pub hashed: HashedUserData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbc: Option<String>,
}

/// One event in a Conversions API request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event_name: String,
    /// Unix seconds.
    pub event_time: i64,
    /// Shared with the browser pixel so Meta can deduplicate the pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source_url: Option<String>,
    pub action_source: String,
    pub user_data: UserData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct EventsRequest<'a> {
    pub data: &'a [ServerEvent],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_event_code: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events_received: u32,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub fbtrace_id: Option<String>,
}

/// Build an `_fbc` value from a click id, in Meta's `fb.1.<ms>.<fbclid>` form.
pub fn fbc_from_fbclid(fbclid: &str, now_ms: i64) -> String {
    format!("fb.1.{now_ms}.{fbclid}")
}

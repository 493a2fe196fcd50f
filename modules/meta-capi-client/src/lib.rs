pub mod error;
pub mod types;

pub use error::{MetaError, Result};
pub use types::{fbc_from_fbclid, EventsResponse, ServerEvent, UserData, ACTION_SOURCE_WEBSITE};

use std::time::Duration;

use types::EventsRequest;

const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com";

/// Server-side client for `POST /{version}/{pixel_id}/events`.
pub struct MetaConversionsClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    pixel_id: String,
    access_token: String,
    test_event_code: Option<String>,
}

impl MetaConversionsClient {
    pub fn new(pixel_id: &str, access_token: &str, api_version: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            api_version: normalize_version(api_version),
            pixel_id: pixel_id.to_string(),
            access_token: access_token.to_string(),
            test_event_code: None,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Route events to the Events Manager "Test events" tab.
    pub fn with_test_event_code(mut self, code: Option<String>) -> Self {
        self.test_event_code = code.filter(|c| !c.is_empty());
        self
    }

    pub fn pixel_id(&self) -> &str {
        &self.pixel_id
    }

    fn events_url(&self) -> String {
        format!(
            "{}/{}/{}/events",
            self.base_url, self.api_version, self.pixel_id
        )
    }

    pub async fn send_events(&self, events: &[ServerEvent]) -> Result<EventsResponse> {
        let body = EventsRequest {
            data: events,
            test_event_code: self.test_event_code.as_deref(),
        };

        let resp = self
            .client
            .post(self.events_url())
            .query(&[("access_token", self.access_token.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(MetaError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: EventsResponse = serde_json::from_str(&text)?;
        tracing::info!(
            pixel_id = %self.pixel_id,
            events_received = parsed.events_received,
            fbtrace_id = ?parsed.fbtrace_id,
            test = self.test_event_code.is_some(),
            "Conversions API events sent"
        );
        Ok(parsed)
    }
}

fn normalize_version(version: &str) -> String {
    let version = version.trim();
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

pub mod error;
pub mod types;

pub use error::{Ga4Error, Result};
pub use types::{MeasurementEvent, MeasurementPayload, ValidationMessage, ValidationResponse};

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

const DEFAULT_BASE_URL: &str = "https://www.google-analytics.com";

const MAX_EVENT_NAME_LEN: usize = 40;

/// GA4 event names: letter first, then letters, digits or underscores.
static EVENT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

/// Names GA4 reserves for automatically collected events.
const RESERVED_EVENT_NAMES: &[&str] = &[
    "ad_activeview",
    "ad_click",
    "ad_exposure",
    "ad_query",
    "adunit_exposure",
    "app_clear_data",
    "app_install",
    "app_remove",
    "app_update",
    "error",
    "first_open",
    "first_visit",
    "in_app_purchase",
    "notification_dismiss",
    "notification_foreground",
    "notification_open",
    "notification_receive",
    "os_update",
    "session_start",
    "user_engagement",
];

/// Server-to-server client for the GA4 Measurement Protocol.
pub struct Ga4Client {
    client: reqwest::Client,
    base_url: String,
    measurement_id: String,
    api_secret: String,
}

impl Ga4Client {
    pub fn new(measurement_id: &str, api_secret: &str) -> Self {
        Self::with_client(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            measurement_id,
            api_secret,
        )
    }

    pub fn with_client(client: reqwest::Client, measurement_id: &str, api_secret: &str) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            measurement_id: measurement_id.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    /// Point the client somewhere other than Google (staging relays, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn measurement_id(&self) -> &str {
        &self.measurement_id
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .query(&[
                ("measurement_id", self.measurement_id.as_str()),
                ("api_secret", self.api_secret.as_str()),
            ])
    }

    /// Send events to `/mp/collect` as given. Google answers 2xx even for
    /// malformed events, so callers wanting feedback use
    /// [`validate_event_name`] or [`Ga4Client::validate`].
    pub async fn send(&self, payload: &MeasurementPayload) -> Result<()> {
        let resp = self
            .post("/mp/collect")
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Ga4Error::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        tracing::info!(
            measurement_id = %self.measurement_id,
            events = payload.events.len(),
            status = status.as_u16(),
            "GA4 events sent"
        );
        Ok(())
    }

    /// Run the payload through the validation server.
    pub async fn validate(&self, payload: &MeasurementPayload) -> Result<Vec<ValidationMessage>> {
        let resp = self
            .post("/debug/mp/collect")
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Ga4Error::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let parsed: ValidationResponse = serde_json::from_str(&body)?;
        Ok(parsed.validation_messages)
    }
}

/// Reject names GA4 would silently drop.
pub fn validate_event_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_EVENT_NAME_LEN {
        return Err(Ga4Error::InvalidEvent(format!(
            "event name must be 1-{MAX_EVENT_NAME_LEN} characters: '{name}'"
        )));
    }
    if !EVENT_NAME_RE.is_match(name) {
        return Err(Ga4Error::InvalidEvent(format!(
            "event name must start with a letter and use only letters, digits and underscores: '{name}'"
        )));
    }
    let reserved_prefix = ["ga_", "google_", "firebase_"]
        .iter()
        .any(|p| name.starts_with(p));
    if reserved_prefix || RESERVED_EVENT_NAMES.contains(&name) {
        return Err(Ga4Error::InvalidEvent(format!("event name is reserved: '{name}'")));
    }
    Ok(())
}

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier used when a caller does not supply one. Callers that omit it
/// share a single dedup slot per event name.
pub const DEFAULT_IDENTIFIER: &str = "default";

// --- Standard event names ---

pub const EVENT_LEAD: &str = "Lead";
pub const EVENT_CONTACT: &str = "Contact";
pub const EVENT_VIEW_CONTENT: &str = "ViewContent";
pub const EVENT_SCROLL: &str = "Scroll";
pub const EVENT_PAGE_VIEW: &str = "PageView";

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// A record of an event that has already been emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub event_name: String,
    pub identifier: String,
    /// Epoch milliseconds at which the event was sent.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl StoredEvent {
    pub fn matches(&self, event_name: &str, identifier: &str) -> bool {
        self.event_name == event_name && self.identifier == identifier
    }

    /// Active while `now - timestamp < ttl`.
    pub fn is_active(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.timestamp) < ttl.as_millis() as i64
    }
}

/// Per-event-name time-to-live for dedup records.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    default_ttl: Duration,
    ttls: HashMap<String, Duration>,
}

impl TtlPolicy {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            ttls: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, event_name: impl Into<String>, ttl: Duration) -> Self {
        self.ttls.insert(event_name.into(), ttl);
        self
    }

    pub fn ttl_for(&self, event_name: &str) -> Duration {
        self.ttls.get(event_name).copied().unwrap_or(self.default_ttl)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(6 * HOUR))
            .with_ttl(EVENT_LEAD, Duration::from_secs(24 * HOUR))
            .with_ttl(EVENT_CONTACT, Duration::from_secs(HOUR))
            .with_ttl(EVENT_VIEW_CONTENT, Duration::from_secs(30 * MINUTE))
            .with_ttl(EVENT_SCROLL, Duration::from_secs(15 * MINUTE))
            .with_ttl(EVENT_PAGE_VIEW, Duration::from_secs(5 * MINUTE))
    }
}

/// Outcome of an operation whose failure must not interrupt the caller.
///
/// Analytics side effects (dedup writes, server mirroring, CRM forwarding)
/// report through this type instead of `Result` so ignoring it is fine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    Applied,
    Degraded { reason: String },
}

impl BestEffort {
    pub fn degraded(reason: impl std::fmt::Display) -> Self {
        BestEffort::Degraded {
            reason: reason.to_string(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, BestEffort::Applied)
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

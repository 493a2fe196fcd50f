use std::sync::Arc;

use tracing::{debug, warn};
use vfx_common::{BestEffort, StoredEvent, TtlPolicy, DEFAULT_IDENTIFIER};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::store::KeyValueStore;

/// Storage key under which the sent-event list is kept.
pub const DEFAULT_STORAGE_KEY: &str = "vfx_sent_events";

type Metadata = serde_json::Map<String, serde_json::Value>;

/// Suppresses resends of the same `(event_name, identifier)` pair within the
/// event's TTL window.
///
/// Storage failures never surface to callers: a failed read means "not a
/// duplicate" and a failed write is reported as [`BestEffort::Degraded`].
/// Over-sending is preferred to losing a conversion.
pub struct EventDeduplicator<S> {
    store: S,
    storage_key: String,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> EventDeduplicator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            policy: TtlPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_policy(mut self, policy: TtlPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// True iff an unexpired record for the pair exists.
    pub async fn is_already_sent(&self, event_name: &str, identifier: Option<&str>) -> bool {
        let identifier = identifier.unwrap_or(DEFAULT_IDENTIFIER);
        let events = match self.load().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, event_name, "Dedup store read failed, treating as not sent");
                return false;
            }
        };

        let now = self.clock.now_ms();
        let ttl = self.policy.ttl_for(event_name);
        let sent = events
            .iter()
            .any(|e| e.matches(event_name, identifier) && e.is_active(now, ttl));
        if sent {
            debug!(event_name, identifier, "Event already sent within TTL");
        }
        sent
    }

    /// Record the pair as sent now, dropping every expired record on the way.
    pub async fn mark_as_sent(
        &self,
        event_name: &str,
        identifier: Option<&str>,
        metadata: Option<Metadata>,
    ) -> BestEffort {
        let identifier = identifier.unwrap_or(DEFAULT_IDENTIFIER);
        let outcome = self
            .append_and_collect(StoredEvent {
                event_name: event_name.to_string(),
                identifier: identifier.to_string(),
                timestamp: self.clock.now_ms(),
                metadata,
            })
            .await;

        match outcome {
            Ok(()) => BestEffort::Applied,
            Err(e) => {
                warn!(error = %e, event_name, identifier, "Failed to record sent event");
                BestEffort::degraded(e)
            }
        }
    }

    /// Remove matching records. With no filter every record goes.
    pub async fn clear(&self, event_name: Option<&str>, identifier: Option<&str>) -> BestEffort {
        let outcome = match (event_name, identifier) {
            (None, None) => self.store.delete(&self.storage_key).await,
            _ => self.remove_matching(event_name, identifier).await,
        };

        match outcome {
            Ok(()) => BestEffort::Applied,
            Err(e) => {
                warn!(error = %e, ?event_name, ?identifier, "Failed to clear sent events");
                BestEffort::degraded(e)
            }
        }
    }

    /// Unexpired records, oldest first. Empty when the store is unreadable.
    pub async fn active_events(&self) -> Vec<StoredEvent> {
        match self.load().await {
            Ok(events) => {
                let now = self.clock.now_ms();
                events
                    .into_iter()
                    .filter(|e| e.is_active(now, self.policy.ttl_for(&e.event_name)))
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "Dedup store read failed");
                Vec::new()
            }
        }
    }

    async fn load(&self) -> Result<Vec<StoredEvent>> {
        match self.store.get(&self.storage_key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, events: &[StoredEvent]) -> Result<()> {
        let raw = serde_json::to_string(events)?;
        self.store.set(&self.storage_key, raw, None).await
    }

    async fn append_and_collect(&self, event: StoredEvent) -> Result<()> {
        // An unreadable list is replaced rather than blocking new records.
        let mut events = self.load().await.unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable sent-event list");
            Vec::new()
        });
        events.push(event);

        let now = self.clock.now_ms();
        let before = events.len();
        events.retain(|e| e.is_active(now, self.policy.ttl_for(&e.event_name)));
        if events.len() < before {
            debug!(pruned = before - events.len(), "Pruned expired sent events");
        }

        self.persist(&events).await
    }

    async fn remove_matching(&self, event_name: Option<&str>, identifier: Option<&str>) -> Result<()> {
        let mut events = self.load().await?;
        events.retain(|e| {
            let name_matches = event_name.is_none_or(|n| e.event_name == n);
            let id_matches = identifier.is_none_or(|i| e.identifier == i);
            !(name_matches && id_matches)
        });
        self.persist(&events).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    const START: i64 = 1_700_000_000_000;

    fn dedup_with_clock() -> (EventDeduplicator<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let dedup = EventDeduplicator::new(MemoryStore::new()).with_clock(clock.clone());
        (dedup, clock)
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(StoreError::Backend("unavailable".into()))
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<()> {
            Err(StoreError::Backend("unavailable".into()))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(StoreError::Backend("unavailable".into()))
        }
    }

    #[tokio::test]
    async fn sent_until_ttl_elapses_for_every_standard_event() {
        for (name, ttl) in [
            ("Lead", Duration::from_secs(24 * 3600)),
            ("Contact", Duration::from_secs(3600)),
            ("ViewContent", Duration::from_secs(1800)),
            ("Scroll", Duration::from_secs(900)),
            ("PageView", Duration::from_secs(300)),
            ("CustomThing", Duration::from_secs(6 * 3600)),
        ] {
            let (dedup, clock) = dedup_with_clock();
            assert!(!dedup.is_already_sent(name, Some("x")).await);

            assert!(dedup.mark_as_sent(name, Some("x"), None).await.is_applied());
            assert!(dedup.is_already_sent(name, Some("x")).await, "{name} right after send");

            clock.advance(ttl - Duration::from_millis(1));
            assert!(dedup.is_already_sent(name, Some("x")).await, "{name} just before expiry");

            clock.advance(Duration::from_millis(1));
            assert!(!dedup.is_already_sent(name, Some("x")).await, "{name} at expiry");
        }
    }

    #[tokio::test]
    async fn missing_identifier_collides_on_default() {
        let (dedup, _) = dedup_with_clock();
        dedup.mark_as_sent("Contact", None, None).await;
        assert!(dedup.is_already_sent("Contact", None).await);
        assert!(dedup.is_already_sent("Contact", Some("default")).await);
        assert!(!dedup.is_already_sent("Contact", Some("other")).await);
    }

    #[tokio::test]
    async fn pairs_are_independent() {
        let (dedup, _) = dedup_with_clock();
        dedup.mark_as_sent("Lead", Some("a"), None).await;
        assert!(!dedup.is_already_sent("Contact", Some("a")).await);
        assert!(!dedup.is_already_sent("Lead", Some("b")).await);
    }

    #[tokio::test]
    async fn expired_records_are_pruned_on_write() {
        let (dedup, clock) = dedup_with_clock();
        dedup.mark_as_sent("PageView", Some("home"), None).await;
        dedup.mark_as_sent("Lead", Some("form"), None).await;

        clock.advance(Duration::from_secs(301));
        dedup.mark_as_sent("Scroll", Some("50"), None).await;

        let remaining: Vec<String> = dedup
            .load()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_name)
            .collect();
        assert_eq!(remaining, vec!["Lead".to_string(), "Scroll".to_string()]);
    }

    #[tokio::test]
    async fn clear_with_filters_removes_only_matches() {
        let (dedup, _) = dedup_with_clock();
        dedup.mark_as_sent("Lead", Some("a"), None).await;
        dedup.mark_as_sent("Lead", Some("b"), None).await;
        dedup.mark_as_sent("Contact", Some("a"), None).await;

        dedup.clear(Some("Lead"), Some("a")).await;
        assert!(!dedup.is_already_sent("Lead", Some("a")).await);
        assert!(dedup.is_already_sent("Lead", Some("b")).await);
        assert!(dedup.is_already_sent("Contact", Some("a")).await);

        dedup.clear(None, Some("a")).await;
        assert!(!dedup.is_already_sent("Contact", Some("a")).await);
        assert!(dedup.is_already_sent("Lead", Some("b")).await);

        dedup.clear(Some("Lead"), None).await;
        assert!(dedup.active_events().await.is_empty());
    }

    #[tokio::test]
    async fn clear_without_filter_removes_everything() {
        let (dedup, _) = dedup_with_clock();
        dedup.mark_as_sent("Lead", Some("a"), None).await;
        dedup.mark_as_sent("Contact", None, None).await;

        assert!(dedup.clear(None, None).await.is_applied());
        assert!(dedup.active_events().await.is_empty());
    }

    #[tokio::test]
    async fn metadata_is_kept_with_the_record() {
        let (dedup, _) = dedup_with_clock();
        let mut meta = serde_json::Map::new();
        meta.insert("form".into(), serde_json::json!("hero"));
        dedup.mark_as_sent("Lead", Some("a"), Some(meta.clone())).await;

        let events = dedup.active_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata.as_ref(), Some(&meta));
        assert_eq!(events[0].timestamp, START);
    }

    #[tokio::test]
    async fn broken_store_fails_open() {
        let dedup = EventDeduplicator::new(BrokenStore);
        assert!(!dedup.mark_as_sent("Lead", Some("a"), None).await.is_applied());
        assert!(!dedup.is_already_sent("Lead", Some("a")).await);
        assert!(!dedup.clear(None, None).await.is_applied());
        assert!(dedup.active_events().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_list_is_treated_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(DEFAULT_STORAGE_KEY, "not json".into(), None)
            .await
            .unwrap();
        let dedup = EventDeduplicator::new(store.clone());

        assert!(!dedup.is_already_sent("Lead", Some("a")).await);
        assert!(dedup.mark_as_sent("Lead", Some("a"), None).await.is_applied());
        assert!(dedup.is_already_sent("Lead", Some("a")).await);
    }

    #[tokio::test]
    async fn custom_policy_overrides_default_table() {
        let clock = Arc::new(ManualClock::new(START));
        let dedup = EventDeduplicator::new(MemoryStore::new())
            .with_clock(clock.clone())
            .with_policy(TtlPolicy::new(Duration::from_secs(10)));

        dedup.mark_as_sent("Lead", None, None).await;
        clock.advance(Duration::from_secs(10));
        assert!(!dedup.is_already_sent("Lead", None).await);
    }
}

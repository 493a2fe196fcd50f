use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;
use vfx_common::hashing::UserIdentity;
use vfx_common::types::BestEffort;
use vfx_dedup::{EventDeduplicator, KeyValueStore};

use crate::gate::{InitGate, InitState};
use crate::gateway::{CommandSink, Gateway};
use crate::mirror::ServerMirror;

/// Per-visitor values shared by every event on the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    /// GA4 client id (the `_ga` cookie value without its `GA1.x.` prefix).
    pub client_id: Option<String>,
    /// `_vfx_extid` cookie.
    pub external_id: Option<String>,
    pub page_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackedEvent {
    pub name: String,
    /// Dedup scope within the event name, e.g. a form id or page path.
    pub identifier: Option<String>,
    pub params: Map<String, Value>,
    /// Shared between browser and server copies of the event.
    pub event_id: String,
    pub user: Option<UserIdentity>,
}

impl TrackedEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: None,
            params: Map::new(),
            event_id: Uuid::new_v4().to_string(),
            user: None,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = Some(user);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Sent { event_id: String, mirrored: BestEffort },
    /// Already sent within its TTL window.
    Duplicate,
    /// Gateway not initialized yet. Events are not queued.
    Dropped,
}

pub struct Tracker<S> {
    gateway: Arc<dyn Gateway>,
    gate: InitGate,
    sink: Arc<dyn CommandSink>,
    dedup: EventDeduplicator<S>,
    mirror: Option<Arc<dyn ServerMirror>>,
    session: SessionContext,
}

impl<S: KeyValueStore> Tracker<S> {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        sink: Arc<dyn CommandSink>,
        dedup: EventDeduplicator<S>,
        session: SessionContext,
    ) -> Self {
        Self {
            gateway,
            gate: InitGate::new(),
            sink,
            dedup,
            mirror: None,
            session,
        }
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn ServerMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn state(&self) -> InitState {
        self.gate.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.gate.is_initialized()
    }

    /// Request the vendor script. True only the first time.
    pub fn load_script(&self) -> bool {
        let first = self.gate.begin();
        if first {
            debug!(gateway = self.gateway.name(), "Loading tag script");
        }
        first
    }

    /// The vendor script finished loading: issue the init call once.
    pub fn script_loaded(&self) -> bool {
        let gateway = &self.gateway;
        let sink = &self.sink;
        let session = &self.session;
        let ran = self
            .gate
            .complete(|| sink.emit(gateway.init_call(session)));
        if ran {
            debug!(gateway = gateway.name(), "Gateway initialized");
        }
        ran
    }

    pub async fn track_event(&self, event: TrackedEvent) -> TrackOutcome {
        let gateway = self.gateway.name();
        if !self.gate.is_initialized() {
            debug!(gateway, event_name = %event.name, "Gateway not initialized, dropping event");
            return TrackOutcome::Dropped;
        }

        let identifier = event.identifier.as_deref();
        if self.dedup.is_already_sent(&event.name, identifier).await {
            debug!(gateway, event_name = %event.name, identifier, "Duplicate event skipped");
            return TrackOutcome::Duplicate;
        }

        self.sink.emit(self.gateway.format_event(&event));

        let mut metadata = Map::new();
        metadata.insert("gateway".into(), json!(gateway));
        metadata.insert("eventId".into(), json!(event.event_id));
        self.dedup
            .mark_as_sent(&event.name, identifier, Some(metadata))
            .await;

        let mirrored = self.mirror_event(&event).await;
        TrackOutcome::Sent {
            event_id: event.event_id,
            mirrored,
        }
    }

    async fn mirror_event(&self, event: &TrackedEvent) -> BestEffort {
        let Some(mirror) = &self.mirror else {
            return BestEffort::Applied;
        };
        let Some(request) = self.gateway.mirror_request(event, &self.session) else {
            return BestEffort::degraded("no server relay for this event");
        };
        match mirror.mirror(&request).await {
            Ok(()) => BestEffort::Applied,
            Err(e) => {
                warn!(
                    gateway = self.gateway.name(),
                    event_name = %event.name,
                    error = %e,
                    "Server mirror failed"
                );
                BestEffort::degraded(e)
            }
        }
    }
}

use std::sync::Mutex;

use serde_json::{json, Map, Value};
use vfx_common::types::{EVENT_CONTACT, EVENT_LEAD, EVENT_PAGE_VIEW, EVENT_SCROLL, EVENT_VIEW_CONTENT};

use crate::mirror::MirrorRequest;
use crate::tracker::{SessionContext, TrackedEvent};

/// A call into a browser tag function, e.g. `fbq('track', 'Lead', {...})`.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub function: &'static str,
    pub args: Vec<Value>,
}

impl Command {
    pub fn new(function: &'static str, args: Vec<Value>) -> Self {
        Self { function, args }
    }
}

/// Receives tag commands once a gateway is initialized.
pub trait CommandSink: Send + Sync {
    fn emit(&self, command: Command);
}

/// Sink that only logs. Used when no tag runtime is attached.
pub struct TracingSink;

impl CommandSink for TracingSink {
    fn emit(&self, command: Command) {
        tracing::debug!(function = command.function, args = ?command.args, "Tag command");
    }
}

/// Sink that keeps every command for later inspection.
#[derive(Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<Command>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CommandSink for RecordingSink {
    fn emit(&self, command: Command) {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command);
    }
}

/// An analytics vendor as seen from the page: how it initializes, how an
/// event is expressed, and how the same event is replayed server-side.
pub trait Gateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Issued exactly once, when the vendor script reports loaded.
    fn init_call(&self, session: &SessionContext) -> Command;

    fn format_event(&self, event: &TrackedEvent) -> Command;

    /// Server relay request carrying the same event, if the vendor has one.
    fn mirror_request(&self, event: &TrackedEvent, session: &SessionContext) -> Option<MirrorRequest>;
}

/// Events Meta recognizes with `fbq('track', ...)`. Anything else goes
/// through `trackCustom`.
pub const META_STANDARD_EVENTS: &[&str] = &[
    "AddPaymentInfo",
    "AddToCart",
    "AddToWishlist",
    "CompleteRegistration",
    EVENT_CONTACT,
    "CustomizeProduct",
    "Donate",
    "FindLocation",
    "InitiateCheckout",
    EVENT_LEAD,
    EVENT_PAGE_VIEW,
    "Purchase",
    "Schedule",
    "Search",
    "StartTrial",
    "SubmitApplication",
    "Subscribe",
    EVENT_VIEW_CONTENT,
];

pub struct MetaPixel {
    pixel_id: String,
}

impl MetaPixel {
    pub fn new(pixel_id: impl Into<String>) -> Self {
        Self {
            pixel_id: pixel_id.into(),
        }
    }

    pub fn pixel_id(&self) -> &str {
        &self.pixel_id
    }

    pub fn is_standard_event(name: &str) -> bool {
        META_STANDARD_EVENTS.contains(&name)
    }
}

impl Gateway for MetaPixel {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn init_call(&self, session: &SessionContext) -> Command {
        let mut args = vec![json!("init"), json!(self.pixel_id)];
        if let Some(external_id) = &session.external_id {
            args.push(json!({ "external_id": external_id }));
        }
        Command::new("fbq", args)
    }

    fn format_event(&self, event: &TrackedEvent) -> Command {
        let method = if Self::is_standard_event(&event.name) {
            "track"
        } else {
            "trackCustom"
        };
        Command::new(
            "fbq",
            vec![
                json!(method),
                json!(event.name),
                Value::Object(event.params.clone()),
                json!({ "eventID": event.event_id }),
            ],
        )
    }

    fn mirror_request(&self, event: &TrackedEvent, session: &SessionContext) -> Option<MirrorRequest> {
        let mut body = Map::new();
        body.insert("event_name".into(), json!(event.name));
        body.insert("event_id".into(), json!(event.event_id));
        if let Some(url) = &session.page_url {
            body.insert("event_source_url".into(), json!(url));
        }
        // Plain identifiers; the relay hashes them. The session's external id
        // keeps the server copy matched to the pixel's visitor.
        let mut user = event.user.clone().unwrap_or_default();
        if user.external_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
            user.external_id = session.external_id.clone();
        }
        let user_data = serde_json::to_value(&user).unwrap_or_else(|_| json!({}));
        body.insert("user_data".into(), user_data);
        if !event.params.is_empty() {
            body.insert("custom_data".into(), Value::Object(event.params.clone()));
        }
        Some(MirrorRequest {
            path: "/api/meta-conversions".into(),
            body: Value::Object(body),
        })
    }
}

pub struct Ga4Gateway {
    measurement_id: String,
}

impl Ga4Gateway {
    pub fn new(measurement_id: impl Into<String>) -> Self {
        Self {
            measurement_id: measurement_id.into(),
        }
    }

    pub fn measurement_id(&self) -> &str {
        &self.measurement_id
    }

    /// GA4 recommended name for one of our standard events.
    pub fn event_name(name: &str) -> String {
        match name {
            EVENT_LEAD => "generate_lead".into(),
            EVENT_CONTACT => "contact".into(),
            EVENT_VIEW_CONTENT => "view_item".into(),
            EVENT_SCROLL => "scroll".into(),
            EVENT_PAGE_VIEW => "page_view".into(),
            other => other.to_string(),
        }
    }
}

impl Gateway for Ga4Gateway {
    fn name(&self) -> &'static str {
        "ga4"
    }

    fn init_call(&self, session: &SessionContext) -> Command {
        let mut config = Map::new();
        config.insert("send_page_view".into(), json!(false));
        if let Some(user_id) = &session.external_id {
            config.insert("user_id".into(), json!(user_id));
        }
        Command::new(
            "gtag",
            vec![json!("config"), json!(self.measurement_id), Value::Object(config)],
        )
    }

    fn format_event(&self, event: &TrackedEvent) -> Command {
        Command::new(
            "gtag",
            vec![
                json!("event"),
                json!(Self::event_name(&event.name)),
                Value::Object(event.params.clone()),
            ],
        )
    }

    fn mirror_request(&self, event: &TrackedEvent, session: &SessionContext) -> Option<MirrorRequest> {
        let client_id = session.client_id.as_ref()?;
        let mut body = Map::new();
        body.insert("eventName".into(), json!(Self::event_name(&event.name)));
        body.insert("params".into(), Value::Object(event.params.clone()));
        body.insert("clientId".into(), json!(client_id));
        if let Some(user_id) = &session.external_id {
            body.insert("userId".into(), json!(user_id));
        }
        Some(MirrorRequest {
            path: "/api/ga4".into(),
            body: Value::Object(body),
        })
    }
}

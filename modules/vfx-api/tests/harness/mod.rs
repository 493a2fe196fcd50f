//! Test harness for relay integration tests.
//!
//! Runs the real router on an ephemeral port. Google and Meta are replaced by
//! a local axum stub; webhooks go through a scripted `MockTransport`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use vfx_api::leads::{LeadStore, MemoryLeadStore};
use vfx_api::{router, AppState};
use vfx_common::Config;
use webhook_client::{MockReply, MockTransport, RetryPolicy, WebhookDispatcher};

/// One request seen by the upstream stub.
#[derive(Debug, Clone)]
pub struct UpstreamCall {
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Value,
}

#[derive(Clone)]
struct UpstreamState {
    calls: Arc<Mutex<Vec<UpstreamCall>>>,
    status: StatusCode,
}

/// Stand-in for both the GA4 Measurement Protocol and the Graph API.
pub struct Upstream {
    pub base_url: String,
    calls: Arc<Mutex<Vec<UpstreamCall>>>,
}

impl Upstream {
    pub async fn spawn(status: StatusCode) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = UpstreamState {
            calls: calls.clone(),
            status,
        };

        let app = Router::new()
            .route("/mp/collect", post(collect))
            .route("/{version}/{pixel}/events", post(graph_events))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().unwrap().clone()
    }
}

async fn collect(
    State(s): State<UpstreamState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    s.calls.lock().unwrap().push(UpstreamCall {
        path: "/mp/collect".into(),
        query,
        body,
    });
    if s.status.is_success() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (s.status, Json(json!({"error": "measurement rejected"}))).into_response()
    }
}

async fn graph_events(
    State(s): State<UpstreamState>,
    Path((version, pixel)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let received = body["data"].as_array().map(|a| a.len()).unwrap_or(0);
    s.calls.lock().unwrap().push(UpstreamCall {
        path: format!("/{version}/{pixel}/events"),
        query,
        body,
    });
    if s.status.is_success() {
        Json(json!({"events_received": received, "messages": [], "fbtrace_id": "trace-1"}))
            .into_response()
    } else {
        (
            s.status,
            Json(json!({"error": {"message": "Invalid OAuth access token", "code": 190}})),
        )
            .into_response()
    }
}

/// Config with GA4 and Meta pointed at `upstream`.
pub fn configured(upstream: &Upstream) -> Config {
    Config {
        facebook_pixel_id: Some("1234567890".into()),
        meta_api_access_token: Some("meta-token".into()),
        meta_graph_base_url: upstream.base_url.clone(),
        ga4_measurement_id: Some("G-TEST123".into()),
        ga4_api_secret: Some("ga4-secret".into()),
        ga4_base_url: upstream.base_url.clone(),
        ..Config::empty()
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub transport: Arc<MockTransport>,
    pub leads: Arc<MemoryLeadStore>,
}

pub struct TestAppBuilder {
    config: Config,
    replies: Vec<MockReply>,
    with_leads: bool,
}

impl TestAppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            replies: Vec::new(),
            with_leads: true,
        }
    }

    pub fn webhook_replies(mut self, replies: Vec<MockReply>) -> Self {
        self.replies = replies;
        self
    }

    pub fn without_lead_store(mut self) -> Self {
        self.with_leads = false;
        self
    }

    pub async fn spawn(self) -> TestApp {
        let transport = Arc::new(MockTransport::new(self.replies));
        let webhooks = WebhookDispatcher::new(transport.clone()).with_policy(RetryPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(1),
            base_backoff: Duration::from_millis(10),
        });
        let leads = Arc::new(MemoryLeadStore::new());
        let lead_store: Option<Arc<dyn LeadStore>> = if self.with_leads {
            Some(leads.clone() as Arc<dyn LeadStore>)
        } else {
            None
        };

        let state = Arc::new(AppState {
            config: self.config,
            http: reqwest::Client::new(),
            webhooks: Arc::new(webhooks),
            leads: lead_store,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApp {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            transport,
            leads,
        }
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    /// Wait for spawned webhook deliveries to reach the transport.
    pub async fn wait_for_webhooks(&self, count: usize) {
        for _ in 0..100 {
            if self.transport.call_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {count} webhook calls, saw {}",
            self.transport.call_count()
        );
    }
}

/// Values of every `Set-Cookie` header on `resp`.
pub fn set_cookies(resp: &reqwest::Response) -> Vec<String> {
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(String::from))
        .collect()
}

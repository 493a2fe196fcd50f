use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::warn;

use vfx_common::Config;
use webhook_client::WebhookDispatcher;

pub mod cookies;
pub mod error;
pub mod leads;
pub mod rest;

use leads::LeadStore;

pub struct AppState {
    pub config: Config,
    /// Shared by the GA4, Meta and Supabase calls.
    pub http: reqwest::Client,
    pub webhooks: Arc<WebhookDispatcher>,
    /// `None` when Supabase is not configured.
    pub leads: Option<Arc<dyn LeadStore>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/api/health", get(rest::api_health))
        .route("/api/webhook", post(rest::webhook::api_webhook))
        .route("/api/ga4", post(rest::ga4::api_ga4_event))
        .route("/api/ga4/collect", post(rest::ga4::api_ga4_collect))
        .route("/api/meta-conversions", post(rest::meta::api_meta_conversions))
        .route("/api/leads", post(rest::leads::api_leads))
        .with_state(state)
        .layer(axum::middleware::from_fn(cookies::visitor_cookies))
        .layer(cors)
        // Relay responses are per-visitor; never cache them
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        // Logging layer: method + path only (no query params, no IP)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

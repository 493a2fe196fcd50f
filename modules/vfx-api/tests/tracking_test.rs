//! Browser-side tracker mirroring through the relay to the upstream stub.
//!
//! Run with: cargo test -p vfx-api --test tracking_test

mod harness;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use harness::{configured, TestAppBuilder, Upstream};
use vfx_common::hash_data;
use vfx_common::hashing::UserIdentity;
use vfx_dedup::{EventDeduplicator, MemoryStore};
use vfx_tracking::{
    Ga4Gateway, HttpMirror, MetaPixel, RecordingSink, SessionContext, TrackOutcome, TrackedEvent,
    Tracker,
};

#[tokio::test]
async fn pixel_lead_reaches_conversions_api_hashed() {
    let upstream = Upstream::spawn(StatusCode::OK).await;
    let app = TestAppBuilder::new(configured(&upstream)).spawn().await;

    let tracker = Tracker::new(
        Arc::new(MetaPixel::new("1234567890")),
        Arc::new(RecordingSink::new()),
        EventDeduplicator::new(MemoryStore::new()),
        SessionContext {
            external_id: Some("ext-1".into()),
            page_url: Some("https://vfx.example/diagnostico".into()),
            ..Default::default()
        },
    )
    .with_mirror(Arc::new(HttpMirror::new(&app.base_url)));
    tracker.load_script();
    tracker.script_loaded();

    let event = TrackedEvent::new("Lead")
        .with_identifier("diagnostico-form")
        .with_event_id("evt-e2e")
        .with_user(UserIdentity {
            email: Some("Ana@Example.com".into()),
            name: Some("Ana Souza".into()),
            ..Default::default()
        });
    let outcome = tracker.track_event(event.clone()).await;
    assert!(matches!(outcome, TrackOutcome::Sent { ref mirrored, .. } if mirrored.is_applied()));

    // Same form again within 24h never leaves the browser.
    assert_eq!(tracker.track_event(event).await, TrackOutcome::Duplicate);

    let calls = upstream.calls();
    assert_eq!(calls.len(), 1);
    let sent = &calls[0].body["data"][0];
    assert_eq!(sent["event_id"], json!("evt-e2e"));
    assert_eq!(sent["event_source_url"], json!("https://vfx.example/diagnostico"));
    assert_eq!(sent["user_data"]["em"], json!(hash_data("ana@example.com")));
    assert_eq!(sent["user_data"]["fn"], json!(hash_data("ana")));
    // Same visitor id the pixel was initialized with, not a fresh cookie.
    assert_eq!(sent["user_data"]["external_id"], json!(hash_data("ext-1")));
}

#[tokio::test]
async fn gtag_event_reaches_measurement_protocol() {
    let upstream = Upstream::spawn(StatusCode::NO_CONTENT).await;
    let app = TestAppBuilder::new(configured(&upstream)).spawn().await;

    let tracker = Tracker::new(
        Arc::new(Ga4Gateway::new("G-TEST123")),
        Arc::new(RecordingSink::new()),
        EventDeduplicator::new(MemoryStore::new()),
        SessionContext {
            client_id: Some("987.654".into()),
            ..Default::default()
        },
    )
    .with_mirror(Arc::new(HttpMirror::new(&app.base_url)));
    tracker.script_loaded();

    let outcome = tracker.track_event(TrackedEvent::new("Contact")).await;
    assert!(matches!(outcome, TrackOutcome::Sent { .. }));

    let calls = upstream.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body["client_id"], json!("987.654"));
    assert_eq!(calls[0].body["events"][0]["name"], json!("contact"));
}

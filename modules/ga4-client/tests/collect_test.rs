//! Measurement Protocol client against a local stand-in for Google.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use ga4_client::{Ga4Client, Ga4Error, MeasurementEvent, MeasurementPayload};

#[derive(Clone, Default)]
struct Captured {
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn spawn_google(collect_status: StatusCode) -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/mp/collect",
            post(
                move |State(c): State<Captured>,
                      Query(q): Query<HashMap<String, String>>,
                      Json(body): Json<serde_json::Value>| async move {
                    c.queries.lock().unwrap().push(q);
                    c.bodies.lock().unwrap().push(body);
                    (collect_status, "upstream body")
                },
            ),
        )
        .route(
            "/debug/mp/collect",
            post(|| async {
                Json(serde_json::json!({
                    "validationMessages": [{
                        "fieldPath": "events",
                        "description": "Event name is reserved",
                        "validationCode": "NAME_RESERVED"
                    }]
                }))
            }),
        )
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), captured)
}

fn lead_payload() -> MeasurementPayload {
    let mut params = serde_json::Map::new();
    params.insert("form_id".into(), serde_json::json!("hero"));
    MeasurementPayload::single(
        "555.777",
        MeasurementEvent {
            name: "generate_lead".into(),
            params,
        },
    )
    .user_id(Some("user-9".into()))
}

#[tokio::test]
async fn send_posts_payload_with_credentials() {
    let (base, captured) = spawn_google(StatusCode::NO_CONTENT).await;
    let client = Ga4Client::new("G-TEST", "secret-1").with_base_url(&base);

    client.send(&lead_payload()).await.unwrap();

    let query = &captured.queries.lock().unwrap()[0];
    assert_eq!(query["measurement_id"], "G-TEST");
    assert_eq!(query["api_secret"], "secret-1");

    let body = &captured.bodies.lock().unwrap()[0];
    assert_eq!(body["client_id"], "555.777");
    assert_eq!(body["user_id"], "user-9");
    assert_eq!(body["events"][0]["name"], "generate_lead");
    assert_eq!(body["events"][0]["params"]["form_id"], "hero");
}

#[tokio::test]
async fn upstream_failure_carries_status_and_body() {
    let (base, _) = spawn_google(StatusCode::FORBIDDEN).await;
    let client = Ga4Client::new("G-TEST", "bad").with_base_url(&base);

    match client.send(&lead_payload()).await {
        Err(Ga4Error::Api { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "upstream body");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn credentials_are_query_escaped() {
    let (base, captured) = spawn_google(StatusCode::NO_CONTENT).await;
    let client = Ga4Client::new("G-TEST", "a&b=c d").with_base_url(&base);

    client.send(&lead_payload()).await.unwrap();

    let query = &captured.queries.lock().unwrap()[0];
    assert_eq!(query["api_secret"], "a&b=c d");
    assert_eq!(query["measurement_id"], "G-TEST");
    assert_eq!(query.len(), 2);
}

#[tokio::test]
async fn custom_event_names_are_forwarded_as_given() {
    let (base, captured) = spawn_google(StatusCode::NO_CONTENT).await;
    let client = Ga4Client::new("G-TEST", "secret").with_base_url(&base);
    let payload = MeasurementPayload::single(
        "1.2",
        MeasurementEvent {
            name: "cta-click".into(),
            params: serde_json::Map::new(),
        },
    );

    client.send(&payload).await.unwrap();

    assert_eq!(captured.bodies.lock().unwrap()[0]["events"][0]["name"], "cta-click");
}

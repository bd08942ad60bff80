//! HTTP edge behavior: validation at the boundary, queue-backed acceptance.

use axum::http::StatusCode;
use event_queue::EventQueue;
use serde_json::json;

use pipeline_tests::fixtures::{wire_custom, wire_pageview};
use pipeline_tests::setup;

#[tokio::test]
async fn valid_pageview_is_accepted_and_queued() {
    let (server, pipe) = setup::test_server("trk-1");

    let response = server
        .post("/api/track")
        .json(&wire_pageview("trk-1", "v-1", "s-1"))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "queued");

    // Accepted means queued, not persisted.
    assert_eq!(pipe.queue.len().await.unwrap(), 1);
    assert!(pipe.store.pageviews().is_empty());
}

#[tokio::test]
async fn accepted_event_lands_in_storage_after_a_flush() {
    let (server, pipe) = setup::test_server("trk-1");

    server
        .post("/api/track")
        .json(&wire_custom("trk-1", "v-1", "s-1"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    pipe.flusher.flush().await.unwrap();

    let events = pipe.store.custom_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_name, "signup");
    assert_eq!(pipe.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_event_type_is_rejected_before_the_queue() {
    let (server, pipe) = setup::test_server("trk-1");

    let mut payload = wire_pageview("trk-1", "v-1", "s-1");
    payload["event_type"] = json!("bogus");

    let response = server.post("/api/track").json(&payload).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(pipe.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_event_type_is_rejected() {
    let (server, _) = setup::test_server("trk-1");

    let mut payload = wire_pageview("trk-1", "v-1", "s-1");
    payload.as_object_mut().unwrap().remove("event_type");

    server
        .post("/api/track")
        .json(&payload)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn field_limits_are_enforced_at_the_edge() {
    let (server, pipe) = setup::test_server("trk-1");

    let mut payload = wire_pageview("trk-1", "v-1", "s-1");
    payload["page_url"] = json!(format!("https://example.com/{}", "x".repeat(100_000)));

    let response = server.post("/api/track").json(&payload).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    // Rejected before the queue, same as a bad event type.
    assert_eq!(pipe.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (server, _) = setup::test_server("trk-1");

    let response = server
        .post("/api/track")
        .json(&json!({ "event_type": "pageview" }))
        .await;

    // Tagged correctly but missing the required wire fields.
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn events_for_unregistered_sites_are_still_queued() {
    // Tenant resolution happens at flush time, not at the edge.
    let (server, pipe) = setup::test_server("trk-1");

    server
        .post("/api/track")
        .json(&wire_pageview("trk-ghost", "v-1", "s-1"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    pipe.flusher.flush().await.unwrap();
    assert!(pipe.store.pageviews().is_empty());
    assert_eq!(pipe.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn total_outage_surfaces_as_server_error() {
    let (server, store) = setup::broken_test_server("trk-1");

    let response = server
        .post("/api/track")
        .json(&wire_pageview("trk-1", "v-1", "s-1"))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);
    assert!(store.pageviews().is_empty());
}

#[tokio::test]
async fn health_reports_queue_depth() {
    let (server, _) = setup::test_server("trk-1");

    server
        .post("/api/track")
        .json(&wire_pageview("trk-1", "v-1", "s-1"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["queue_depth"], 1);
}

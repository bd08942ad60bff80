//! End-to-end pipeline behavior over the in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use event_queue::EventQueue;
use event_store::EventStore;
use pipeline::{FlushConfig, FlushOutcome, IngestOutcome, Ingestor};
use pipeline_tests::fixtures::{custom_event, pageview, pageview_at};
use pipeline_tests::mocks::{DownQueue, SlowStore};
use pipeline_tests::setup::{self, flusher_over};
use tracker_core::GeoInfo;

async fn flush_until_empty(pipe: &setup::TestPipeline) {
    loop {
        pipe.flusher.flush().await.unwrap();
        if pipe.queue.len().await.unwrap() == 0 {
            break;
        }
    }
}

#[tokio::test]
async fn every_enqueued_event_reaches_storage() {
    let pipe = setup::pipeline_with_config(
        "trk-1",
        FlushConfig {
            batch_size: 100,
            ..FlushConfig::default()
        },
    );

    // More than two full batches, unique visitors so every event is a row.
    for i in 0..250 {
        let visitor = format!("v-{i}");
        pipe.queue
            .enqueue(custom_event("trk-1", &visitor, "s-1"))
            .await
            .unwrap();
    }

    flush_until_empty(&pipe).await;

    assert_eq!(pipe.store.custom_events().len(), 250);
    assert_eq!(pipe.store.visitors().len(), 250);
}

#[tokio::test]
async fn visitor_identity_holds_across_flushes() {
    let pipe = setup::pipeline("trk-1");
    let first_seen = Utc::now();
    let later = first_seen + chrono::Duration::minutes(10);

    pipe.queue
        .enqueue(pageview_at("trk-1", "v-1", "s-1", first_seen))
        .await
        .unwrap();
    pipe.flusher.flush().await.unwrap();

    pipe.queue
        .enqueue(pageview_at("trk-1", "v-1", "s-2", later))
        .await
        .unwrap();
    pipe.flusher.flush().await.unwrap();

    let visitors = pipe.store.visitors();
    assert_eq!(visitors.len(), 1);
    let visitor = &visitors[0];
    assert_eq!(visitor.first_seen, first_seen);
    assert_eq!(visitor.last_seen, later);
    assert!(visitor.is_returning);

    // Both sessions hang off the same visitor row.
    let sessions = pipe.store.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.visitor_ref == visitor.id));
}

#[tokio::test]
async fn session_attributes_come_from_its_first_event() {
    let pipe = setup::pipeline("trk-1");

    let mut first = pageview("trk-1", "v-1", "s-1");
    first.client.user_agent = Some("Firefox/1.0".into());
    first.client.device.browser_name = "Firefox".into();

    let mut second = pageview("trk-1", "v-1", "s-1");
    second.client.user_agent = Some("Chrome/1.0".into());
    second.client.device.browser_name = "Chrome".into();
    second.client.location = GeoInfo {
        country: Some("DE".into()),
        region: None,
        city: Some("Berlin".into()),
    };

    pipe.queue.enqueue(first).await.unwrap();
    pipe.flusher.flush().await.unwrap();
    pipe.queue.enqueue(second).await.unwrap();
    pipe.flusher.flush().await.unwrap();

    let sessions = pipe.store.sessions();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    // Device stays from the first event; unset location backfills later.
    assert_eq!(session.device.browser_name, "Firefox");
    assert_eq!(session.user_agent, "Firefox/1.0");
    assert_eq!(session.location.country.as_deref(), Some("DE"));
    assert_eq!(session.page_views, 2);
}

#[tokio::test]
async fn concurrent_flushes_are_mutually_exclusive() {
    let pipe = setup::pipeline("trk-1");
    let slow = Arc::new(SlowStore::new(pipe.store.clone(), Duration::from_millis(50)));
    let flusher_a = flusher_over(pipe.queue.clone(), pipe.leaser.clone(), slow.clone());
    let flusher_b = flusher_over(pipe.queue.clone(), pipe.leaser.clone(), slow);

    pipe.queue
        .enqueue(pageview("trk-1", "v-1", "s-1"))
        .await
        .unwrap();

    // The first to acquire the lease spends 50ms inside persist, so the
    // other attempt overlaps and must skip.
    let (a, b) = tokio::join!(flusher_a.flush(), flusher_b.flush());
    let outcomes = [a.unwrap(), b.unwrap()];

    let drained: usize = outcomes
        .iter()
        .map(|o| match o {
            FlushOutcome::Completed(report) => report.drained,
            FlushOutcome::Skipped => 0,
        })
        .sum();
    assert_eq!(drained, 1);
    assert!(outcomes.contains(&FlushOutcome::Skipped));
    assert_eq!(pipe.store.pageviews().len(), 1);
}

#[tokio::test]
async fn failing_tenant_leaves_neighbors_untouched() {
    let pipe = setup::pipeline("trk-a");
    let other = pipeline_tests::fixtures::website("trk-b");
    pipe.store.insert_website(other.clone());
    pipe.store.fail_website(other.id);

    pipe.queue
        .enqueue(pageview("trk-a", "v-1", "s-1"))
        .await
        .unwrap();
    pipe.queue
        .enqueue(pageview("trk-b", "v-2", "s-2"))
        .await
        .unwrap();

    let FlushOutcome::Completed(report) = pipe.flusher.flush().await.unwrap() else {
        panic!("expected a completed flush");
    };

    assert_eq!(report.failed_tenants, vec!["trk-b".to_string()]);
    assert_eq!(pipe.store.pageviews().len(), 1);
    assert_eq!(pipe.queue.len().await.unwrap(), 1);

    // Once the tenant recovers, the requeued events flush through.
    pipe.store.heal_website(other.id);
    pipe.flusher.flush().await.unwrap();
    assert_eq!(pipe.store.pageviews().len(), 2);
    assert_eq!(pipe.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn identifierless_events_are_dropped_not_stuck() {
    let pipe = setup::pipeline("trk-1");
    let mut event = pageview("trk-1", "v-1", "s-1");
    event.visitor_id = String::new();
    pipe.queue.enqueue(event).await.unwrap();

    let FlushOutcome::Completed(report) = pipe.flusher.flush().await.unwrap() else {
        panic!("expected a completed flush");
    };

    assert_eq!(report.drained, 1);
    // Dropped silently: no rows, no requeue, queue empty.
    assert!(pipe.store.pageviews().is_empty());
    assert_eq!(report.requeued, 0);
    assert_eq!(pipe.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn requeued_events_drain_before_new_arrivals() {
    let pipe = setup::pipeline("trk-a");
    let other = pipeline_tests::fixtures::website("trk-b");
    pipe.store.insert_website(other.clone());
    pipe.store.fail_website(other.id);

    pipe.queue
        .enqueue(custom_event("trk-b", "v-old", "s-1"))
        .await
        .unwrap();
    pipe.flusher.flush().await.unwrap();

    // A new event arrives after the failed flush requeued the old one.
    pipe.queue
        .enqueue(custom_event("trk-b", "v-new", "s-2"))
        .await
        .unwrap();
    pipe.store.heal_website(other.id);

    let drained = pipe.queue.drain(10).await.unwrap();
    let order: Vec<&str> = drained.iter().map(|e| e.visitor_id.as_str()).collect();
    assert_eq!(order, vec!["v-old", "v-new"]);
}

#[tokio::test]
async fn ingest_errors_when_queue_and_fallback_both_fail() {
    let pipe = setup::pipeline("trk-1");
    let site = pipe
        .store
        .find_website("trk-1")
        .await
        .unwrap()
        .expect("registered in setup");
    pipe.store.fail_website(site.id);

    let degraded = Ingestor::new(Arc::new(DownQueue), pipe.flusher.clone(), pipe.store.clone());
    let result = degraded.ingest(pageview("trk-1", "v-1", "s-1")).await;

    // The one producer-visible failure: nothing accepted the event.
    assert!(result.is_err());
    assert!(pipe.store.visitors().is_empty());
    assert!(pipe.store.pageviews().is_empty());
}

#[tokio::test]
async fn direct_write_matches_the_flushed_path() {
    let pipe = setup::pipeline("trk-1");

    // Ingest one event through a dead queue and one through the normal
    // queue-then-flush path.
    let degraded = Ingestor::new(Arc::new(DownQueue), pipe.flusher.clone(), pipe.store.clone());
    let outcome = degraded
        .ingest(pageview("trk-1", "v-direct", "s-1"))
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::WroteDirect);

    pipe.queue
        .enqueue(pageview("trk-1", "v-queued", "s-2"))
        .await
        .unwrap();
    pipe.flusher.flush().await.unwrap();

    // Both paths produce the same row shapes.
    let visitors = pipe.store.visitors();
    assert_eq!(visitors.len(), 2);
    assert_eq!(pipe.store.sessions().len(), 2);
    assert_eq!(pipe.store.pageviews().len(), 2);
    let direct = visitors
        .iter()
        .find(|v| v.visitor_id == "v-direct")
        .unwrap();
    assert!(!direct.is_returning);
}

//! Common wiring for pipeline and API tests.

use std::sync::Arc;

use axum_test::TestServer;

use api::{router, AppState};
use event_queue::{EventQueue, MemoryLeaser, MemoryQueue};
use event_store::{EventStore, MemoryStore};
use pipeline::{BatchFlusher, FlushConfig, Ingestor};

use crate::fixtures;
use crate::mocks::DownQueue;

/// A fully wired in-memory pipeline.
pub struct TestPipeline {
    pub queue: Arc<MemoryQueue>,
    pub leaser: Arc<MemoryLeaser>,
    pub store: Arc<MemoryStore>,
    pub flusher: Arc<BatchFlusher>,
}

/// Wires a pipeline over fresh in-memory collaborators, with one active
/// website registered under `tracking_id`.
pub fn pipeline(tracking_id: &str) -> TestPipeline {
    pipeline_with_config(tracking_id, FlushConfig::default())
}

pub fn pipeline_with_config(tracking_id: &str, config: FlushConfig) -> TestPipeline {
    let queue = Arc::new(MemoryQueue::new());
    let leaser = Arc::new(MemoryLeaser::new());
    let store = Arc::new(MemoryStore::new());
    store.insert_website(fixtures::website(tracking_id));

    let flusher = Arc::new(BatchFlusher::new(
        queue.clone(),
        leaser.clone(),
        store.clone(),
        config,
    ));

    TestPipeline {
        queue,
        leaser,
        store,
        flusher,
    }
}

/// Builds a flusher over an externally provided store implementation,
/// sharing the given queue and leaser.
pub fn flusher_over(
    queue: Arc<MemoryQueue>,
    leaser: Arc<MemoryLeaser>,
    store: Arc<dyn EventStore>,
) -> Arc<BatchFlusher> {
    Arc::new(BatchFlusher::new(
        queue as Arc<dyn EventQueue>,
        leaser,
        store,
        FlushConfig::default(),
    ))
}

/// Spins up the HTTP app over a dead queue and a store failing for the
/// given tenant, so both the enqueue and the direct fallback fail.
pub fn broken_test_server(tracking_id: &str) -> (TestServer, Arc<MemoryStore>) {
    let queue: Arc<dyn EventQueue> = Arc::new(DownQueue);
    let store = Arc::new(MemoryStore::new());
    let site = fixtures::website(tracking_id);
    store.fail_website(site.id);
    store.insert_website(site);

    let flusher = Arc::new(BatchFlusher::new(
        queue.clone(),
        Arc::new(MemoryLeaser::new()),
        store.clone(),
        FlushConfig::default(),
    ));
    let ingestor = Arc::new(Ingestor::new(queue.clone(), flusher, store.clone()));
    let server = TestServer::new(router(AppState::new(ingestor, queue))).unwrap();
    (server, store)
}

/// Spins up the HTTP app over a fresh pipeline.
pub fn test_server(tracking_id: &str) -> (TestServer, TestPipeline) {
    let pipe = pipeline(tracking_id);
    let ingestor = Arc::new(Ingestor::new(
        pipe.queue.clone(),
        pipe.flusher.clone(),
        pipe.store.clone(),
    ));
    let state = AppState::new(ingestor, pipe.queue.clone());
    let server = TestServer::new(router(state)).unwrap();
    (server, pipe)
}

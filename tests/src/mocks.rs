//! Failure-injecting collaborators for pipeline tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use event_queue::EventQueue;
use event_store::{EventStore, MemoryStore, PersistStats};
use tracker_core::{
    CustomEvent, Error, PageView, RawEvent, Result, SessionRecord, SessionUpdate, Visitor,
    VisitorUpdate, Website, WriteSet,
};

/// A queue whose backing service is unreachable. Every call fails.
pub struct DownQueue;

#[async_trait]
impl EventQueue for DownQueue {
    async fn enqueue(&self, _event: RawEvent) -> Result<()> {
        Err(Error::queue("connection refused"))
    }

    async fn drain(&self, _max: usize) -> Result<Vec<RawEvent>> {
        Err(Error::queue("connection refused"))
    }

    async fn requeue(&self, _events: Vec<RawEvent>) -> Result<()> {
        Err(Error::queue("connection refused"))
    }

    async fn len(&self) -> Result<usize> {
        Err(Error::queue("connection refused"))
    }
}

/// A store whose `persist` takes a while, so one flush cycle reliably
/// overlaps a concurrent attempt in lease tests.
pub struct SlowStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl EventStore for SlowStore {
    async fn find_website(&self, tracking_id: &str) -> Result<Option<Website>> {
        self.inner.find_website(tracking_id).await
    }

    async fn find_visitor(&self, website_id: Uuid, visitor_id: &str) -> Result<Option<Visitor>> {
        self.inner.find_visitor(website_id, visitor_id).await
    }

    async fn find_session(
        &self,
        website_id: Uuid,
        session_id: &str,
    ) -> Result<Option<SessionRecord>> {
        self.inner.find_session(website_id, session_id).await
    }

    async fn create_visitors(&self, rows: Vec<Visitor>) -> Result<usize> {
        self.inner.create_visitors(rows).await
    }

    async fn update_visitors(&self, updates: Vec<VisitorUpdate>) -> Result<usize> {
        self.inner.update_visitors(updates).await
    }

    async fn create_sessions(&self, rows: Vec<SessionRecord>) -> Result<usize> {
        self.inner.create_sessions(rows).await
    }

    async fn update_sessions(&self, updates: Vec<SessionUpdate>) -> Result<usize> {
        self.inner.update_sessions(updates).await
    }

    async fn create_pageviews(&self, rows: Vec<PageView>) -> Result<usize> {
        self.inner.create_pageviews(rows).await
    }

    async fn create_custom_events(&self, rows: Vec<CustomEvent>) -> Result<usize> {
        self.inner.create_custom_events(rows).await
    }

    async fn persist(&self, write_set: WriteSet) -> Result<PersistStats> {
        tokio::time::sleep(self.delay).await;
        self.inner.persist(write_set).await
    }

    async fn close_stale_sessions(&self, idle_timeout: chrono::Duration) -> Result<usize> {
        self.inner.close_stale_sessions(idle_timeout).await
    }
}

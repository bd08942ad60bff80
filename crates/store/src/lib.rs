//! Storage collaborator: tenant lookups plus the bulk-writer contract.
//!
//! The flush core only ever talks to this trait. Creates for keyed rows
//! (visitors, sessions) ignore conflicts: the uniqueness constraints mean a
//! conflict is a race with another flush or a direct write, and the newer
//! create is simply discarded without touching the pre-existing row.
//! Updates are field-scoped to the mutated columns.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use tracker_core::{
    CustomEvent, PageView, Result, SessionRecord, SessionUpdate, Visitor, VisitorUpdate, Website,
    WriteSet,
};

/// Row counts from persisting one write-set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistStats {
    pub visitors_created: usize,
    pub visitors_updated: usize,
    pub sessions_created: usize,
    pub sessions_updated: usize,
    pub pageviews_created: usize,
    pub custom_events_created: usize,
}

impl PersistStats {
    pub fn total_rows(&self) -> usize {
        self.visitors_created
            + self.visitors_updated
            + self.sessions_created
            + self.sessions_updated
            + self.pageviews_created
            + self.custom_events_created
    }
}

/// The storage layer as seen by the pipeline.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Looks up a tenant by its opaque tracking token. Inactive tenants
    /// are returned as-is; the resolver decides to drop their events.
    async fn find_website(&self, tracking_id: &str) -> Result<Option<Website>>;

    async fn find_visitor(&self, website_id: Uuid, visitor_id: &str) -> Result<Option<Visitor>>;

    async fn find_session(
        &self,
        website_id: Uuid,
        session_id: &str,
    ) -> Result<Option<SessionRecord>>;

    /// Bulk-creates visitors, ignoring `(website, visitor_id)` conflicts.
    /// Returns the number of rows actually inserted.
    async fn create_visitors(&self, rows: Vec<Visitor>) -> Result<usize>;

    /// Bulk-updates visitors, restricted to `last_seen` and `is_returning`.
    async fn update_visitors(&self, updates: Vec<VisitorUpdate>) -> Result<usize>;

    /// Bulk-creates sessions, ignoring `(website, session_id)` conflicts.
    async fn create_sessions(&self, rows: Vec<SessionRecord>) -> Result<usize>;

    /// Bulk-updates sessions: page-view counter plus set-if-unset location
    /// backfill.
    async fn update_sessions(&self, updates: Vec<SessionUpdate>) -> Result<usize>;

    async fn create_pageviews(&self, rows: Vec<PageView>) -> Result<usize>;

    async fn create_custom_events(&self, rows: Vec<CustomEvent>) -> Result<usize>;

    /// Persists one tenant group's write-set as a single unit of work.
    ///
    /// The provided implementation sequences the bulk operations in
    /// dependency order; transactional backends should override it so the
    /// whole set commits or rolls back together.
    async fn persist(&self, write_set: WriteSet) -> Result<PersistStats> {
        let mut stats = PersistStats::default();
        stats.visitors_created = self.create_visitors(write_set.visitors_to_create).await?;
        stats.visitors_updated = self.update_visitors(write_set.visitors_to_update).await?;
        stats.sessions_created = self.create_sessions(write_set.sessions_to_create).await?;
        stats.sessions_updated = self.update_sessions(write_set.sessions_to_update).await?;
        stats.pageviews_created = self.create_pageviews(write_set.pageviews_to_create).await?;
        stats.custom_events_created = self
            .create_custom_events(write_set.custom_events_to_create)
            .await?;
        Ok(stats)
    }

    /// Closes sessions idle past the timeout: sets `ended_at` to
    /// `started_at + timeout` and the duration accordingly. Returns the
    /// number of sessions closed. Run by the background sweep, not the
    /// flush core.
    async fn close_stale_sessions(&self, idle_timeout: chrono::Duration) -> Result<usize>;
}

pub use memory::MemoryStore;

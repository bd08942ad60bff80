//! In-memory store implementation.
//!
//! Backs single-node deployments and the test suite. `persist` holds the
//! write lock for the whole write-set, so a tenant group commits
//! atomically with respect to concurrent flushes.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use tracker_core::{
    CustomEvent, Error, PageView, Result, SessionRecord, SessionUpdate, Visitor, VisitorUpdate,
    Website, WriteSet,
};

use crate::{EventStore, PersistStats};

#[derive(Default)]
struct Tables {
    /// Keyed by tracking token.
    websites: HashMap<String, Website>,
    /// Keyed by `(website, visitor_id)` — the uniqueness constraint.
    visitors: HashMap<(Uuid, String), Visitor>,
    /// Keyed by `(website, session_id)`.
    sessions: HashMap<(Uuid, String), SessionRecord>,
    pageviews: Vec<PageView>,
    custom_events: Vec<CustomEvent>,
}

/// Concurrent in-memory store with per-tenant failure injection for tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Website ids whose persistence is forced to fail.
    failing: RwLock<HashSet<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tenant.
    pub fn insert_website(&self, website: Website) {
        self.tables
            .write()
            .websites
            .insert(website.tracking_id.clone(), website);
    }

    /// Forces every persist touching the given website to fail.
    pub fn fail_website(&self, website_id: Uuid) {
        self.failing.write().insert(website_id);
    }

    /// Clears a previously injected failure.
    pub fn heal_website(&self, website_id: Uuid) {
        self.failing.write().remove(&website_id);
    }

    pub fn visitors(&self) -> Vec<Visitor> {
        self.tables.read().visitors.values().cloned().collect()
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.tables.read().sessions.values().cloned().collect()
    }

    pub fn pageviews(&self) -> Vec<PageView> {
        self.tables.read().pageviews.clone()
    }

    pub fn custom_events(&self) -> Vec<CustomEvent> {
        self.tables.read().custom_events.clone()
    }

    fn check_failure(&self, tables: &Tables, write_set: &WriteSet) -> Result<()> {
        let failing = self.failing.read();
        if failing.is_empty() {
            return Ok(());
        }
        let touched = write_set
            .visitors_to_create
            .iter()
            .map(|v| v.website_id)
            .chain(write_set.sessions_to_create.iter().map(|s| s.website_id))
            .chain(write_set.pageviews_to_create.iter().map(|p| p.website_id))
            .chain(
                write_set
                    .custom_events_to_create
                    .iter()
                    .map(|c| c.website_id),
            )
            .chain(
                // Updates carry row ids only; resolve them to a website.
                tables
                    .visitors
                    .values()
                    .filter(|v| {
                        write_set
                            .visitors_to_update
                            .iter()
                            .any(|u| u.id == v.id)
                    })
                    .map(|v| v.website_id),
            );
        for website_id in touched {
            if failing.contains(&website_id) {
                return Err(Error::storage(format!(
                    "injected failure for website {website_id}"
                )));
            }
        }
        Ok(())
    }

    fn apply_visitor_creates(tables: &mut Tables, rows: Vec<Visitor>) -> usize {
        let mut inserted = 0;
        for row in rows {
            let key = (row.website_id, row.visitor_id.clone());
            // Conflict: keep the pre-existing row untouched.
            tables.visitors.entry(key).or_insert_with(|| {
                inserted += 1;
                row
            });
        }
        inserted
    }

    fn apply_visitor_updates(tables: &mut Tables, updates: Vec<VisitorUpdate>) -> usize {
        let mut updated = 0;
        for update in updates {
            if let Some(visitor) = tables.visitors.values_mut().find(|v| v.id == update.id) {
                visitor.last_seen = visitor.last_seen.max(update.last_seen);
                visitor.is_returning |= update.is_returning;
                updated += 1;
            }
        }
        updated
    }

    fn apply_session_creates(tables: &mut Tables, rows: Vec<SessionRecord>) -> usize {
        let mut inserted = 0;
        for row in rows {
            let key = (row.website_id, row.session_id.clone());
            tables.sessions.entry(key).or_insert_with(|| {
                inserted += 1;
                row
            });
        }
        inserted
    }

    fn apply_session_updates(tables: &mut Tables, updates: Vec<SessionUpdate>) -> usize {
        let mut updated = 0;
        for update in updates {
            if let Some(session) = tables.sessions.values_mut().find(|s| s.id == update.id) {
                session.page_views = session.page_views.max(update.page_views);
                session.backfill_location(&update.location);
                updated += 1;
            }
        }
        updated
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_website(&self, tracking_id: &str) -> Result<Option<Website>> {
        Ok(self.tables.read().websites.get(tracking_id).cloned())
    }

    async fn find_visitor(&self, website_id: Uuid, visitor_id: &str) -> Result<Option<Visitor>> {
        Ok(self
            .tables
            .read()
            .visitors
            .get(&(website_id, visitor_id.to_string()))
            .cloned())
    }

    async fn find_session(
        &self,
        website_id: Uuid,
        session_id: &str,
    ) -> Result<Option<SessionRecord>> {
        Ok(self
            .tables
            .read()
            .sessions
            .get(&(website_id, session_id.to_string()))
            .cloned())
    }

    async fn create_visitors(&self, rows: Vec<Visitor>) -> Result<usize> {
        Ok(Self::apply_visitor_creates(&mut self.tables.write(), rows))
    }

    async fn update_visitors(&self, updates: Vec<VisitorUpdate>) -> Result<usize> {
        Ok(Self::apply_visitor_updates(&mut self.tables.write(), updates))
    }

    async fn create_sessions(&self, rows: Vec<SessionRecord>) -> Result<usize> {
        Ok(Self::apply_session_creates(&mut self.tables.write(), rows))
    }

    async fn update_sessions(&self, updates: Vec<SessionUpdate>) -> Result<usize> {
        Ok(Self::apply_session_updates(&mut self.tables.write(), updates))
    }

    async fn create_pageviews(&self, rows: Vec<PageView>) -> Result<usize> {
        let mut tables = self.tables.write();
        let count = rows.len();
        tables.pageviews.extend(rows);
        Ok(count)
    }

    async fn create_custom_events(&self, rows: Vec<CustomEvent>) -> Result<usize> {
        let mut tables = self.tables.write();
        let count = rows.len();
        tables.custom_events.extend(rows);
        Ok(count)
    }

    async fn persist(&self, write_set: WriteSet) -> Result<PersistStats> {
        let mut tables = self.tables.write();
        self.check_failure(&tables, &write_set)?;

        let stats = PersistStats {
            visitors_created: Self::apply_visitor_creates(&mut tables, write_set.visitors_to_create),
            visitors_updated: Self::apply_visitor_updates(&mut tables, write_set.visitors_to_update),
            sessions_created: Self::apply_session_creates(&mut tables, write_set.sessions_to_create),
            sessions_updated: Self::apply_session_updates(&mut tables, write_set.sessions_to_update),
            pageviews_created: {
                let count = write_set.pageviews_to_create.len();
                tables.pageviews.extend(write_set.pageviews_to_create);
                count
            },
            custom_events_created: {
                let count = write_set.custom_events_to_create.len();
                tables.custom_events.extend(write_set.custom_events_to_create);
                count
            },
        };

        debug!(rows = stats.total_rows(), "Persisted write-set");
        Ok(stats)
    }

    async fn close_stale_sessions(&self, idle_timeout: chrono::Duration) -> Result<usize> {
        let cutoff = Utc::now() - idle_timeout;
        let mut tables = self.tables.write();
        let mut closed = 0;

        for session in tables.sessions.values_mut() {
            if session.ended_at.is_none() && session.started_at < cutoff {
                session.ended_at = Some(session.started_at + idle_timeout);
                session.duration_seconds = idle_timeout.num_seconds();
                closed += 1;
            }
        }

        if closed > 0 {
            debug!(closed = closed, "Closed stale sessions");
        }
        Ok(closed)
    }
}

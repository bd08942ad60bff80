//! Storage record shapes and the resolver's write-set.
//!
//! These mirror the relational schema the bulk writer persists into.
//! Uniqueness: one `Visitor` per `(website, visitor_id)`, one
//! `SessionRecord` per `(website, session_id)` — the writer treats create
//! conflicts on those keys as already-exists, not as errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{DeviceInfo, GeoInfo};

/// A registered website being tracked (a tenant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Website {
    pub id: Uuid,
    /// Externally visible opaque token events carry.
    pub tracking_id: String,
    pub name: String,
    pub domain: String,
    pub is_active: bool,
}

impl Website {
    pub fn new(
        tracking_id: impl Into<String>,
        name: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracking_id: tracking_id.into(),
            name: name.into(),
            domain: domain.into(),
            is_active: true,
        }
    }
}

/// A unique visitor of one website.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visitor {
    pub id: Uuid,
    pub website_id: Uuid,
    pub visitor_id: String,
    /// Set once at creation, immutable afterwards.
    pub first_seen: DateTime<Utc>,
    /// Monotonically advanced on every sighting.
    pub last_seen: DateTime<Utc>,
    /// False until a second event is seen for the key, then permanently true.
    pub is_returning: bool,
    pub device_type: Option<String>,
    pub country: Option<String>,
}

impl Visitor {
    pub fn new(website_id: Uuid, visitor_id: impl Into<String>, seen_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            website_id,
            visitor_id: visitor_id.into(),
            first_seen: seen_at,
            last_seen: seen_at,
            is_returning: false,
            device_type: None,
            country: None,
        }
    }

    /// Records another sighting: bumps `last_seen` (never backwards) and
    /// marks the visitor returning.
    pub fn record_sighting(&mut self, seen_at: DateTime<Utc>) {
        self.last_seen = self.last_seen.max(seen_at);
        self.is_returning = true;
    }
}

/// Field-scoped visitor update (only the mutated columns).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorUpdate {
    pub id: Uuid,
    pub last_seen: DateTime<Utc>,
    pub is_returning: bool,
}

/// One tracked session of a visitor.
///
/// Device, browser, and user-agent attributes come from the *first* event
/// of the session and are never overwritten; location fields may be
/// backfilled once if they were unset at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub website_id: Uuid,
    /// Owning visitor row, fixed at creation.
    pub visitor_ref: Uuid,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    /// Set by the idle-timeout sweep, not by the flush core.
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    /// Monotonically incremented page-view counter.
    pub page_views: u32,
    pub user_agent: String,
    pub device: DeviceInfo,
    pub ip_address: Option<String>,
    pub location: GeoInfo,
}

impl SessionRecord {
    /// Fills location fields that are still unset. Set fields are kept.
    pub fn backfill_location(&mut self, location: &GeoInfo) {
        if self.location.country.is_none() {
            self.location.country = location.country.clone();
        }
        if self.location.region.is_none() {
            self.location.region = location.region.clone();
        }
        if self.location.city.is_none() {
            self.location.city = location.city.clone();
        }
    }
}

/// Field-scoped session update: the page-view counter plus a one-time
/// location backfill (the writer only applies fields still unset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub id: Uuid,
    pub page_views: u32,
    pub location: GeoInfo,
}

/// An immutable page-view fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView {
    pub id: Uuid,
    pub website_id: Uuid,
    pub session_ref: Uuid,
    pub visitor_ref: Uuid,
    pub page_url: String,
    pub page_title: String,
    pub page_path: String,
    pub referrer_url: Option<String>,
    pub traffic_source: String,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    pub time_on_page: Option<u32>,
    /// Client-side event time from the payload, not server receipt time.
    pub timestamp: DateTime<Utc>,
}

/// An immutable custom-event fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomEvent {
    pub id: Uuid,
    pub website_id: Uuid,
    pub session_ref: Uuid,
    pub visitor_ref: Uuid,
    pub event_name: String,
    pub event_category: Option<String>,
    pub event_action: Option<String>,
    pub event_label: Option<String>,
    pub event_value: Option<f64>,
    pub properties: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// The resolver's output for one tenant group: everything to persist,
/// separated into conflict-ignoring creates and field-scoped updates.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    pub visitors_to_create: Vec<Visitor>,
    pub visitors_to_update: Vec<VisitorUpdate>,
    pub sessions_to_create: Vec<SessionRecord>,
    pub sessions_to_update: Vec<SessionUpdate>,
    pub pageviews_to_create: Vec<PageView>,
    pub custom_events_to_create: Vec<CustomEvent>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.visitors_to_create.is_empty()
            && self.visitors_to_update.is_empty()
            && self.sessions_to_create.is_empty()
            && self.sessions_to_update.is_empty()
            && self.pageviews_to_create.is_empty()
            && self.custom_events_to_create.is_empty()
    }

    /// Number of staged facts (page views + custom events).
    pub fn fact_count(&self) -> usize {
        self.pageviews_to_create.len() + self.custom_events_to_create.len()
    }
}

//! Entity resolver: turns one tenant's ordered events into a write-set.
//!
//! Single pass, deterministic, O(n) with per-flush caches keyed by the
//! visitor and session identifiers. Staged records are reused by later
//! events in the same flush instead of re-querying storage or
//! double-creating, so "already exists" is the normal case, not an error.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use event_store::EventStore;
use tracker_core::{
    traffic, CustomData, CustomEvent, EventPayload, PageView, PageviewData, RawEvent, Result,
    SessionRecord, SessionUpdate, Visitor, VisitorUpdate, Website, WriteSet,
};

struct StagedVisitor {
    record: Visitor,
    /// True when this flush stages the create; false when the row exists
    /// in storage and the accumulated changes become a field-scoped update.
    created_here: bool,
}

struct StagedSession {
    record: SessionRecord,
    created_here: bool,
}

#[derive(Default)]
struct Staging {
    visitors: Vec<StagedVisitor>,
    /// visitor_id → index, in first-occurrence order.
    visitor_index: HashMap<String, usize>,
    sessions: Vec<StagedSession>,
    /// (visitor_id, session_id) → index.
    session_index: HashMap<(String, String), usize>,
    pageviews: Vec<PageView>,
    custom_events: Vec<CustomEvent>,
}

/// Resolves raw events against existing visitor/session state.
#[derive(Clone)]
pub struct EntityResolver {
    store: Arc<dyn EventStore>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Resolves one tenant group. Returns `None` when the tracking token
    /// maps to no active website: the whole group is dropped with a
    /// diagnostic, never an error.
    pub async fn resolve(
        &self,
        tracking_id: &str,
        events: Vec<RawEvent>,
    ) -> Result<Option<WriteSet>> {
        let website = match self.store.find_website(tracking_id).await? {
            Some(website) if website.is_active => website,
            Some(_) => {
                warn!(tracking_id = %tracking_id, count = events.len(),
                      "Dropping events for inactive website");
                telemetry::metrics().events_dropped.inc_by(events.len() as u64);
                return Ok(None);
            }
            None => {
                warn!(tracking_id = %tracking_id, count = events.len(),
                      "Website not found for tracking id");
                telemetry::metrics().events_dropped.inc_by(events.len() as u64);
                return Ok(None);
            }
        };

        let mut staging = Staging::default();

        for event in events {
            if !event.has_identifiers() {
                warn!(tracking_id = %tracking_id, "Dropping event without visitor/session ids");
                telemetry::metrics().events_dropped.inc();
                continue;
            }

            let visitor_idx = self.resolve_visitor(&website, &event, &mut staging).await?;
            let visitor_ref = staging.visitors[visitor_idx].record.id;

            let session_idx = self
                .resolve_session(&website, visitor_ref, &event, &mut staging)
                .await?;

            if matches!(event.payload, EventPayload::Pageview(_)) {
                staging.sessions[session_idx].record.page_views += 1;
            }
            let session_ref = staging.sessions[session_idx].record.id;

            let RawEvent {
                timestamp, payload, ..
            } = event;
            match payload {
                EventPayload::Pageview(data) => staging.pageviews.push(build_pageview(
                    website.id,
                    session_ref,
                    visitor_ref,
                    data,
                    timestamp,
                )),
                EventPayload::Custom(data) => staging.custom_events.push(build_custom_event(
                    website.id,
                    session_ref,
                    visitor_ref,
                    data,
                    timestamp,
                )),
            }
        }

        Ok(Some(assemble(staging)))
    }

    /// Cache → storage → stage-create, merging repeat sightings into the
    /// cached record.
    async fn resolve_visitor(
        &self,
        website: &Website,
        event: &RawEvent,
        staging: &mut Staging,
    ) -> Result<usize> {
        if let Some(&idx) = staging.visitor_index.get(&event.visitor_id) {
            staging.visitors[idx].record.record_sighting(event.queued_at);
            return Ok(idx);
        }

        let staged = match self
            .store
            .find_visitor(website.id, &event.visitor_id)
            .await?
        {
            Some(mut existing) => {
                existing.record_sighting(event.queued_at);
                StagedVisitor {
                    record: existing,
                    created_here: false,
                }
            }
            None => {
                let mut visitor = Visitor::new(website.id, &event.visitor_id, event.queued_at);
                if event.client.device.device_type != "unknown" {
                    visitor.device_type = Some(event.client.device.device_type.clone());
                }
                visitor.country = event.client.location.country.clone();
                StagedVisitor {
                    record: visitor,
                    created_here: true,
                }
            }
        };

        staging.visitors.push(staged);
        let idx = staging.visitors.len() - 1;
        staging
            .visitor_index
            .insert(event.visitor_id.clone(), idx);
        Ok(idx)
    }

    /// First occurrence seeds the session from this event's attributes;
    /// later occurrences only backfill unset location fields.
    async fn resolve_session(
        &self,
        website: &Website,
        visitor_ref: Uuid,
        event: &RawEvent,
        staging: &mut Staging,
    ) -> Result<usize> {
        let key = (event.visitor_id.clone(), event.session_id.clone());
        if let Some(&idx) = staging.session_index.get(&key) {
            staging.sessions[idx]
                .record
                .backfill_location(&event.client.location);
            return Ok(idx);
        }

        let staged = match self
            .store
            .find_session(website.id, &event.session_id)
            .await?
        {
            Some(mut existing) => {
                existing.backfill_location(&event.client.location);
                StagedSession {
                    record: existing,
                    created_here: false,
                }
            }
            None => StagedSession {
                record: SessionRecord {
                    id: Uuid::new_v4(),
                    website_id: website.id,
                    visitor_ref,
                    session_id: event.session_id.clone(),
                    started_at: event.timestamp,
                    ended_at: None,
                    duration_seconds: 0,
                    page_views: 0,
                    user_agent: event.client.user_agent.clone().unwrap_or_default(),
                    device: event.client.device.clone(),
                    ip_address: event.client.ip_address.clone(),
                    location: event.client.location.clone(),
                },
                created_here: true,
            },
        };

        staging.sessions.push(staged);
        let idx = staging.sessions.len() - 1;
        staging.session_index.insert(key, idx);
        Ok(idx)
    }
}

fn assemble(staging: Staging) -> WriteSet {
    let mut write_set = WriteSet {
        pageviews_to_create: staging.pageviews,
        custom_events_to_create: staging.custom_events,
        ..Default::default()
    };

    for staged in staging.visitors {
        if staged.created_here {
            write_set.visitors_to_create.push(staged.record);
        } else {
            write_set.visitors_to_update.push(VisitorUpdate {
                id: staged.record.id,
                last_seen: staged.record.last_seen,
                is_returning: staged.record.is_returning,
            });
        }
    }

    for staged in staging.sessions {
        if staged.created_here {
            write_set.sessions_to_create.push(staged.record);
        } else {
            write_set.sessions_to_update.push(SessionUpdate {
                id: staged.record.id,
                page_views: staged.record.page_views,
                location: staged.record.location,
            });
        }
    }

    write_set
}

fn build_pageview(
    website_id: Uuid,
    session_ref: Uuid,
    visitor_ref: Uuid,
    data: PageviewData,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> PageView {
    let traffic_source = traffic::classify(data.referrer_url.as_deref(), data.utm_source.as_deref());
    let page_path = traffic::page_path(&data.page_url);

    PageView {
        id: Uuid::new_v4(),
        website_id,
        session_ref,
        visitor_ref,
        page_url: data.page_url,
        page_title: data.page_title,
        page_path,
        referrer_url: data.referrer_url,
        traffic_source,
        utm_source: data.utm_source,
        utm_medium: data.utm_medium,
        utm_campaign: data.utm_campaign,
        utm_term: data.utm_term,
        utm_content: data.utm_content,
        screen_width: data.screen_width,
        screen_height: data.screen_height,
        viewport_width: data.viewport_width,
        viewport_height: data.viewport_height,
        time_on_page: data.time_on_page,
        timestamp,
    }
}

fn build_custom_event(
    website_id: Uuid,
    session_ref: Uuid,
    visitor_ref: Uuid,
    data: CustomData,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> CustomEvent {
    CustomEvent {
        id: Uuid::new_v4(),
        website_id,
        session_ref,
        visitor_ref,
        event_name: data.event_name,
        event_category: data.event_category,
        event_action: data.event_action,
        event_label: data.event_label,
        event_value: data.event_value,
        properties: data.properties,
        timestamp,
    }
}

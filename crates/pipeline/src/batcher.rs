//! Tenant batcher: pure grouping of a drained batch by tracking token.

use std::collections::HashMap;
use tracing::warn;

use tracker_core::RawEvent;

/// Partitions a flat batch by tenant token, preserving drained order
/// within each group (the resolver's first-event-wins rule depends on it).
///
/// Events without a tracking token are dropped with a diagnostic and land
/// in no group. No I/O, no other failure modes.
pub fn partition_by_tenant(events: Vec<RawEvent>) -> HashMap<String, Vec<RawEvent>> {
    let mut groups: HashMap<String, Vec<RawEvent>> = HashMap::new();

    for event in events {
        if event.tracking_id.trim().is_empty() {
            warn!(
                visitor_id = %event.visitor_id,
                "Dropping event without a tracking id"
            );
            telemetry::metrics().events_dropped.inc();
            continue;
        }
        groups
            .entry(event.tracking_id.clone())
            .or_default()
            .push(event);
    }

    groups
}

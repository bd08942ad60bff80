//! Lease-guarded batch flusher.
//!
//! One flush cycle: acquire the flush lease (or skip), drain up to a
//! batch of events, partition by tenant, resolve and persist each group
//! independently, requeue the groups that failed, release the lease.
//! Tenant isolation lives here: a failing tenant never blocks the rest
//! of the drained batch.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use event_queue::{EventQueue, Leaser};
use event_store::EventStore;
use tracker_core::{RawEvent, Result};

use crate::batcher::partition_by_tenant;
use crate::resolver::EntityResolver;

/// Tuning for the flush cycle.
#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// Maximum events drained per cycle.
    pub batch_size: usize,
    /// Lease key shared by every flusher instance over the same queue.
    pub lease_key: String,
    /// Lease lifetime. An expired lease is reclaimable, so this bounds
    /// how long a crashed holder can stall flushing.
    pub lease_ttl: Duration,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            lease_key: "analytics:flush_lock".to_string(),
            lease_ttl: Duration::from_secs(30),
        }
    }
}

/// What one flush call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flusher holds the lease; nothing was drained.
    Skipped,
    Completed(FlushReport),
}

/// Accounting for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub drained: usize,
    pub persisted_rows: usize,
    pub dropped: usize,
    pub requeued: usize,
    pub failed_tenants: Vec<String>,
}

pub struct BatchFlusher {
    queue: Arc<dyn EventQueue>,
    leaser: Arc<dyn Leaser>,
    resolver: EntityResolver,
    store: Arc<dyn EventStore>,
    config: FlushConfig,
}

impl BatchFlusher {
    pub fn new(
        queue: Arc<dyn EventQueue>,
        leaser: Arc<dyn Leaser>,
        store: Arc<dyn EventStore>,
        config: FlushConfig,
    ) -> Self {
        Self {
            queue,
            leaser,
            resolver: EntityResolver::new(store.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &FlushConfig {
        &self.config
    }

    /// Runs one flush cycle. Never propagates per-tenant failures; the
    /// only error cases are queue or lease infrastructure faults.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        if !self
            .leaser
            .acquire(&self.config.lease_key, self.config.lease_ttl)
            .await?
        {
            debug!("Flush lease held elsewhere, skipping cycle");
            telemetry::metrics().flushes_skipped.inc();
            return Ok(FlushOutcome::Skipped);
        }

        let result = self.run_locked().await;

        if let Err(err) = self.leaser.release(&self.config.lease_key).await {
            // The lease TTL covers a failed release; the next cycle after
            // expiry reclaims it.
            warn!(error = %err, "Failed to release flush lease");
        }

        result.map(FlushOutcome::Completed)
    }

    async fn run_locked(&self) -> Result<FlushReport> {
        let metrics = telemetry::metrics();
        let events = self.queue.drain(self.config.batch_size).await?;
        if events.is_empty() {
            metrics.flushes_completed.inc();
            return Ok(FlushReport::default());
        }

        let mut report = FlushReport {
            drained: events.len(),
            ..Default::default()
        };
        metrics.events_drained.inc_by(events.len() as u64);

        let mut to_requeue: Vec<RawEvent> = Vec::new();

        for (tracking_id, group) in partition_by_tenant(events) {
            let group_size = group.len();
            // Kept aside so a mid-persist failure can hand the group back
            // to the queue intact.
            let backup = group.clone();

            match self.persist_group(&tracking_id, group).await {
                Ok(Some(rows)) => {
                    report.persisted_rows += rows;
                    metrics.events_persisted.inc_by(group_size as u64);
                }
                Ok(None) => {
                    report.dropped += group_size;
                }
                Err(err) => {
                    error!(
                        tracking_id = %tracking_id,
                        count = group_size,
                        error = %err,
                        "Tenant group failed, requeueing"
                    );
                    metrics.tenant_groups_failed.inc();
                    report.failed_tenants.push(tracking_id);
                    to_requeue.extend(backup);
                }
            }
        }

        if !to_requeue.is_empty() {
            report.requeued = to_requeue.len();
            metrics.events_requeued.inc_by(to_requeue.len() as u64);
            self.queue.requeue(to_requeue).await?;
        }

        metrics.flushes_completed.inc();
        // The batch is already committed; a depth read is reporting only.
        match self.queue.len().await {
            Ok(depth) => metrics.queue_depth.set(depth as u64),
            Err(err) => debug!(error = %err, "Could not read queue depth"),
        }

        info!(
            drained = report.drained,
            persisted_rows = report.persisted_rows,
            dropped = report.dropped,
            requeued = report.requeued,
            "Flush cycle complete"
        );
        Ok(report)
    }

    /// `Ok(None)` means the group was dropped (unknown or inactive
    /// tenant); `Ok(Some(rows))` is a committed group.
    async fn persist_group(
        &self,
        tracking_id: &str,
        group: Vec<RawEvent>,
    ) -> Result<Option<usize>> {
        let Some(write_set) = self.resolver.resolve(tracking_id, group).await? else {
            return Ok(None);
        };
        if write_set.is_empty() {
            return Ok(Some(0));
        }
        let stats = self.store.persist(write_set).await?;
        Ok(Some(stats.total_rows()))
    }
}

//! Producer-side ingestion: enqueue fast, fall back to a direct write.
//!
//! The happy path is a queue append and nothing else. When the queue
//! itself is unavailable the event is written through the same resolver
//! the flusher uses, so both paths produce identical rows.

use std::sync::Arc;

use tracing::{debug, error, warn};

use event_queue::EventQueue;
use event_store::EventStore;
use tracker_core::{RawEvent, Result};

use crate::flusher::BatchFlusher;
use crate::resolver::EntityResolver;

/// How one event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Appended to the queue for the next flush cycle.
    Queued,
    /// Queue unavailable; resolved and persisted synchronously.
    WroteDirect,
    /// Valid wire shape but no destination (unknown tenant, missing
    /// identifiers) on the direct path.
    Dropped,
}

pub struct Ingestor {
    queue: Arc<dyn EventQueue>,
    flusher: Arc<BatchFlusher>,
    resolver: EntityResolver,
    store: Arc<dyn EventStore>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        queue: Arc<dyn EventQueue>,
        flusher: Arc<BatchFlusher>,
        store: Arc<dyn EventStore>,
    ) -> Self {
        let batch_size = flusher.config().batch_size;
        Self {
            queue,
            flusher,
            resolver: EntityResolver::new(store.clone()),
            store,
            batch_size,
        }
    }

    /// Accepts one parsed event. Errors only when both the queue and the
    /// direct fallback fail.
    pub async fn ingest(&self, event: RawEvent) -> Result<IngestOutcome> {
        match self.queue.enqueue(event.clone()).await {
            Ok(()) => {
                telemetry::metrics().events_enqueued.inc();
                self.maybe_trigger_flush().await;
                Ok(IngestOutcome::Queued)
            }
            Err(err) => {
                warn!(error = %err, "Queue unavailable, writing event directly");
                telemetry::metrics().enqueue_fallbacks.inc();
                self.write_direct(event).await
            }
        }
    }

    /// Size trigger: once the backlog reaches a full batch, kick off a
    /// flush without holding up the producer. The lease keeps concurrent
    /// kicks harmless.
    async fn maybe_trigger_flush(&self) {
        let depth = match self.queue.len().await {
            Ok(depth) => depth,
            Err(err) => {
                debug!(error = %err, "Could not read queue depth");
                return;
            }
        };
        telemetry::metrics().queue_depth.set(depth as u64);

        if depth >= self.batch_size {
            let flusher = self.flusher.clone();
            tokio::spawn(async move {
                if let Err(err) = flusher.flush().await {
                    error!(error = %err, "Size-triggered flush failed");
                }
            });
        }
    }

    async fn write_direct(&self, event: RawEvent) -> Result<IngestOutcome> {
        let tracking_id = event.tracking_id.clone();
        let Some(write_set) = self.resolver.resolve(&tracking_id, vec![event]).await? else {
            return Ok(IngestOutcome::Dropped);
        };
        if write_set.is_empty() {
            return Ok(IngestOutcome::Dropped);
        }
        self.store.persist(write_set).await?;
        Ok(IngestOutcome::WroteDirect)
    }
}

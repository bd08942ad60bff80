//! Pipeline counters, collected in-memory and logged periodically.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters for the ingestion pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Producer side
    pub events_enqueued: Counter,
    pub events_rejected: Counter,
    pub enqueue_fallbacks: Counter,

    // Flush side
    pub flushes_completed: Counter,
    pub flushes_skipped: Counter,
    pub events_drained: Counter,
    pub events_persisted: Counter,
    pub events_dropped: Counter,
    pub events_requeued: Counter,
    pub tenant_groups_failed: Counter,

    // Gauges
    pub queue_depth: Gauge,
}

/// A point-in-time view of the metrics, for structured logging.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_enqueued: u64,
    pub events_rejected: u64,
    pub enqueue_fallbacks: u64,
    pub flushes_completed: u64,
    pub flushes_skipped: u64,
    pub events_drained: u64,
    pub events_persisted: u64,
    pub events_dropped: u64,
    pub events_requeued: u64,
    pub tenant_groups_failed: u64,
    pub queue_depth: u64,
}

impl Metrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_enqueued: self.events_enqueued.get(),
            events_rejected: self.events_rejected.get(),
            enqueue_fallbacks: self.enqueue_fallbacks.get(),
            flushes_completed: self.flushes_completed.get(),
            flushes_skipped: self.flushes_skipped.get(),
            events_drained: self.events_drained.get(),
            events_persisted: self.events_persisted.get(),
            events_dropped: self.events_dropped.get(),
            events_requeued: self.events_requeued.get(),
            tenant_groups_failed: self.tenant_groups_failed.get(),
            queue_depth: self.queue_depth.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::default);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}

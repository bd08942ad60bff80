//! Background loops: the periodic flush trigger, the stale-session
//! sweep, and the metrics snapshot log.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use event_store::EventStore;

use crate::flusher::BatchFlusher;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Timer-driven flush cadence. Bounds event staleness when traffic
    /// is too light for the size trigger to fire.
    pub flush_interval: Duration,
    /// How often the stale-session sweep runs.
    pub session_sweep_interval: Duration,
    /// Sessions idle past this are closed at `started_at + timeout`.
    pub session_idle_timeout: chrono::Duration,
    /// Metrics snapshot log cadence.
    pub metrics_log_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            session_sweep_interval: Duration::from_secs(60),
            session_idle_timeout: chrono::Duration::minutes(30),
            metrics_log_interval: Duration::from_secs(60),
        }
    }
}

pub struct PipelineScheduler {
    flusher: Arc<BatchFlusher>,
    store: Arc<dyn EventStore>,
    config: SchedulerConfig,
}

impl PipelineScheduler {
    pub fn new(
        flusher: Arc<BatchFlusher>,
        store: Arc<dyn EventStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            flusher,
            store,
            config,
        }
    }

    /// Spawns the background loops. Each loop logs its failures and keeps
    /// ticking; the handles only resolve at shutdown.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            flush_interval_secs = self.config.flush_interval.as_secs(),
            sweep_interval_secs = self.config.session_sweep_interval.as_secs(),
            "Starting pipeline scheduler"
        );

        vec![
            tokio::spawn(self.clone().flush_loop()),
            tokio::spawn(self.clone().sweep_loop()),
            tokio::spawn(self.metrics_loop()),
        ]
    }

    async fn flush_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.flusher.flush().await {
                Ok(outcome) => debug!(?outcome, "Periodic flush tick"),
                Err(err) => error!(error = %err, "Periodic flush failed"),
            }
        }
    }

    async fn sweep_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.session_sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self
                .store
                .close_stale_sessions(self.config.session_idle_timeout)
                .await
            {
                Ok(0) => {}
                Ok(closed) => info!(closed, "Closed stale sessions"),
                Err(err) => error!(error = %err, "Stale-session sweep failed"),
            }
        }
    }

    async fn metrics_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.metrics_log_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let snapshot = telemetry::metrics().snapshot();
            info!(
                events_enqueued = snapshot.events_enqueued,
                events_persisted = snapshot.events_persisted,
                events_dropped = snapshot.events_dropped,
                events_requeued = snapshot.events_requeued,
                flushes_completed = snapshot.flushes_completed,
                flushes_skipped = snapshot.flushes_skipped,
                queue_depth = snapshot.queue_depth,
                "Pipeline metrics"
            );
        }
    }
}

//! Visiora event tracker
//!
//! Batch event-ingestion pipeline handling:
//! - Tracking event validation at the HTTP edge
//! - Durable FIFO queueing with a size and timer flush trigger
//! - Lease-guarded batch flushing with per-tenant isolation
//! - Background stale-session sweeping

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use api::{router, AppState};
use event_queue::{MemoryLeaser, MemoryQueue};
use event_store::MemoryStore;
use pipeline::{BatchFlusher, FlushConfig, Ingestor, PipelineScheduler, SchedulerConfig};
use telemetry::init_tracing_from_env;

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Events drained per flush cycle.
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    /// Flush lease lifetime in seconds.
    #[serde(default = "default_lease_ttl_secs")]
    lease_ttl_secs: u64,
    /// Timer-driven flush cadence in seconds.
    #[serde(default = "default_flush_interval_secs")]
    flush_interval_secs: u64,
    /// Stale-session sweep cadence in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,
    /// Minutes of inactivity before a session is closed.
    #[serde(default = "default_session_idle_minutes")]
    session_idle_minutes: i64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_batch_size() -> usize {
    100
}

fn default_lease_ttl_secs() -> u64 {
    30
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_session_idle_minutes() -> i64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            batch_size: default_batch_size(),
            lease_ttl_secs: default_lease_ttl_secs(),
            flush_interval_secs: default_flush_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            session_idle_minutes: default_session_idle_minutes(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!("Starting Visiora tracker v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        batch_size = config.batch_size,
        flush_interval_secs = config.flush_interval_secs,
        "Loaded pipeline config"
    );

    // Wire up the pipeline collaborators
    let queue = Arc::new(MemoryQueue::new());
    let leaser = Arc::new(MemoryLeaser::new());
    let store = Arc::new(MemoryStore::new());

    let flusher = Arc::new(BatchFlusher::new(
        queue.clone(),
        leaser,
        store.clone(),
        FlushConfig {
            batch_size: config.batch_size,
            lease_ttl: Duration::from_secs(config.lease_ttl_secs),
            ..FlushConfig::default()
        },
    ));

    let ingestor = Arc::new(Ingestor::new(queue.clone(), flusher.clone(), store.clone()));

    // Start background loops
    let scheduler = Arc::new(PipelineScheduler::new(
        flusher.clone(),
        store,
        SchedulerConfig {
            flush_interval: Duration::from_secs(config.flush_interval_secs),
            session_sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            session_idle_timeout: chrono::Duration::minutes(config.session_idle_minutes),
            ..SchedulerConfig::default()
        },
    ));
    let _scheduler_handles = scheduler.start();

    // Create application state and router
    let state = AppState::new(ingestor, queue);
    let app = router(state);

    // Start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain whatever the shutdown raced with
    info!("Shutting down...");
    if let Err(e) = flusher.flush().await {
        tracing::error!("Final flush failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("VISIORA")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}

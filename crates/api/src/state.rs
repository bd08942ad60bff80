//! Application state shared across handlers.

use std::sync::Arc;

use event_queue::EventQueue;
use pipeline::Ingestor;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Producer-side entry point into the pipeline.
    pub ingestor: Arc<Ingestor>,
    /// The ingestion queue, exposed for depth reporting.
    pub queue: Arc<dyn EventQueue>,
}

impl AppState {
    pub fn new(ingestor: Arc<Ingestor>, queue: Arc<dyn EventQueue>) -> Self {
        Self { ingestor, queue }
    }
}

//! The batch event-ingestion pipeline.
//!
//! Control flow: HTTP edge → [`Ingestor::ingest`] → queue → (size or timer
//! trigger) → [`BatchFlusher::flush`] → [`batcher::partition_by_tenant`] →
//! per-tenant [`EntityResolver::resolve`] → bulk persist.

pub mod batcher;
pub mod flusher;
pub mod ingest;
pub mod resolver;
pub mod scheduler;

pub use flusher::{BatchFlusher, FlushConfig, FlushOutcome, FlushReport};
pub use ingest::{IngestOutcome, Ingestor};
pub use resolver::EntityResolver;
pub use scheduler::{PipelineScheduler, SchedulerConfig};

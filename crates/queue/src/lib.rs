//! Ingestion queue and flush-lease collaborators.
//!
//! Both seams are trait objects so deployments can back them with a
//! process-external store (a broker list, a key-value lease) while tests
//! and single-node setups use the in-memory implementations here.

pub mod lease;
pub mod memory;

use async_trait::async_trait;
use tracker_core::{RawEvent, Result};

/// The durable FIFO buffer between producers and the batch flusher.
///
/// The queue exclusively owns events between `enqueue` and `drain`; a
/// drained event belongs to the flush attempt until it is persisted or
/// handed back via `requeue`.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Appends one event. Bounded local work; never blocks on storage.
    async fn enqueue(&self, event: RawEvent) -> Result<()>;

    /// Removes and returns up to `max` events in arrival order.
    async fn drain(&self, max: usize) -> Result<Vec<RawEvent>>;

    /// Reinserts a drained batch after a flush failure. The events drain
    /// again before anything enqueued later.
    async fn requeue(&self, events: Vec<RawEvent>) -> Result<()>;

    /// Current queue depth.
    async fn len(&self) -> Result<usize>;
}

pub use lease::{Leaser, MemoryLeaser};
pub use memory::MemoryQueue;

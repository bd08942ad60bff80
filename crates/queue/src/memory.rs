//! Concurrent in-memory queue implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracker_core::{RawEvent, Result};

use crate::EventQueue;

/// In-process FIFO queue guarded by a single mutex.
///
/// Every operation is a short critical section, so enqueue stays a bounded
/// local operation under arbitrary concurrent producers.
#[derive(Default)]
pub struct MemoryQueue {
    events: Mutex<VecDeque<RawEvent>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventQueue for MemoryQueue {
    async fn enqueue(&self, event: RawEvent) -> Result<()> {
        self.events.lock().push_back(event);
        Ok(())
    }

    async fn drain(&self, max: usize) -> Result<Vec<RawEvent>> {
        let mut events = self.events.lock();
        let take = max.min(events.len());
        Ok(events.drain(..take).collect())
    }

    async fn requeue(&self, events: Vec<RawEvent>) -> Result<()> {
        let mut queue = self.events.lock();
        // Front-inserted in reverse so the batch drains again in its
        // original order, ahead of anything enqueued meanwhile.
        for event in events.into_iter().rev() {
            queue.push_front(event);
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.events.lock().len())
    }
}

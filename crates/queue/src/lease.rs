//! Time-bounded exclusive lease for flush mutual exclusion.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracker_core::Result;

/// Set-if-absent-with-expiry lease store.
///
/// Only one holder per key at a time; an expired lease is reclaimable so a
/// crashed holder cannot starve future flushes. Expiry is a liveness
/// safeguard, not preemption: a flush still running past its TTL is not
/// interrupted.
#[async_trait]
pub trait Leaser: Send + Sync {
    /// Tries to take the lease. Returns false without waiting when another
    /// unexpired holder exists.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Releases the lease. Releasing an unheld key is a no-op.
    async fn release(&self, key: &str) -> Result<()>;
}

/// In-process lease store: a mutex-guarded map of expiry instants.
#[derive(Default)]
pub struct MemoryLeaser {
    leases: Mutex<HashMap<String, Instant>>,
}

impl MemoryLeaser {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Leaser for MemoryLeaser {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut leases = self.leases.lock();
        if let Some(expires_at) = leases.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }
        leases.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<()> {
        self.leases.lock().remove(key);
        Ok(())
    }
}

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Cancelled;

/// Counting permit pool bounding how many requests are in flight at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Returned to the limiter when dropped.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a free permit. Fails only once the limiter has been closed.
    pub async fn acquire(&self) -> Result<Permit, Cancelled> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Cancelled)?;
        Ok(Permit { _permit: permit })
    }

    /// Wakes every waiter with `Cancelled`; permits already held stay valid.
    pub fn close(&self) {
        self.permits.close();
    }
}

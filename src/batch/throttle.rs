//! Fixed-interval rate limiter for geocoder calls.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces successive `acquire` calls at least `interval` apart, across every
/// task sharing the throttle. The first call passes immediately.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next free slot.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        // Holding the lock while sleeping queues waiters in arrival order
        let mut next_slot = self.next_slot.lock().await;
        if let Some(at) = *next_slot {
            tokio::time::sleep_until(at).await;
        }
        *next_slot = Some(Instant::now() + self.interval);
    }
}

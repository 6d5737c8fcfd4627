//! Running timing statistics for a batch.

use std::time::Duration;
use tokio::time::Instant;

/// Snapshot published after each processed record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub estimated_remaining: Duration,
}

impl BatchProgress {
    /// Fraction complete in `0.0..=1.0`; an empty batch is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed as f64 / self.total as f64
    }
}

/// `(elapsed / processed) * remaining`, zero before the first record.
pub fn estimate_remaining(elapsed: Duration, processed: usize, total: usize) -> Duration {
    if processed == 0 {
        return Duration::ZERO;
    }
    let remaining = total.saturating_sub(processed);
    elapsed.mul_f64(remaining as f64 / processed as f64)
}

/// Wall clock for one batch run.
#[derive(Debug, Clone, Copy)]
pub struct BatchClock {
    start: Instant,
    total: usize,
}

impl BatchClock {
    pub fn start(total: usize) -> Self {
        Self {
            start: Instant::now(),
            total,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn snapshot(&self, processed: usize) -> BatchProgress {
        let elapsed = self.elapsed();
        BatchProgress {
            processed,
            total: self.total,
            elapsed,
            estimated_remaining: estimate_remaining(elapsed, processed, self.total),
        }
    }
}

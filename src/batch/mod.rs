//! Batch driver: geocode each address, match it, and keep the running report.
//!
//! Records come back in input order whatever the concurrency. Cancellation is
//! cooperative; a cancelled run returns the fully processed prefix.

mod progress;
mod throttle;

pub use progress::{estimate_remaining, BatchClock, BatchProgress};
pub use throttle::Throttle;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geocode::Geocoder;
use crate::matching::RegionMatcher;
use crate::models::{AddressRecord, MatchReport};

pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no region datasets loaded; refusing to process {0} records")]
    NoDatasets(usize),
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Minimum spacing between geocoder calls
    pub delay: Duration,
    /// Geocoder calls allowed in flight at once
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            concurrency: 1,
        }
    }
}

enum Step {
    Done { record: AddressRecord, resolved: bool },
    Cancelled,
}

/// Runs one batch against a geocoder and a matcher.
pub struct BatchRunner<'a, G> {
    geocoder: &'a G,
    matcher: &'a RegionMatcher,
    options: BatchOptions,
    cancel: CancellationToken,
    progress: Option<UnboundedSender<BatchProgress>>,
}

impl<'a, G: Geocoder + Sync> BatchRunner<'a, G> {
    pub fn new(geocoder: &'a G, matcher: &'a RegionMatcher) -> Self {
        Self {
            geocoder,
            matcher,
            options: BatchOptions::default(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Publish a [`BatchProgress`] after every processed record.
    pub fn with_progress(mut self, sender: UnboundedSender<BatchProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub async fn run(
        &self,
        records: Vec<AddressRecord>,
    ) -> Result<(Vec<AddressRecord>, MatchReport), BatchError> {
        let total = records.len();
        if self.matcher.is_empty() {
            return Err(BatchError::NoDatasets(total));
        }

        info!(
            "Processing {} addresses against {} datasets ({} region columns)",
            total,
            self.matcher.dataset_count(),
            self.matcher.region_columns().len()
        );

        let mut report = MatchReport::empty(Utc::now());
        let clock = BatchClock::start(total);
        let throttle = Throttle::new(self.options.delay);
        let concurrency = self.options.concurrency.max(1);

        let mut output = Vec::with_capacity(total);
        let mut steps = std::pin::pin!(stream::iter(records.into_iter().enumerate())
            .map(|(row, record)| self.process(row, record, &throttle))
            .buffered(concurrency));

        while let Some(step) = steps.next().await {
            match step {
                Step::Done { record, resolved } => {
                    report.record(record.matched(), resolved);
                    output.push(record);

                    let snapshot = clock.snapshot(output.len());
                    report.estimated_remaining = snapshot.estimated_remaining;
                    if let Some(sender) = &self.progress {
                        // A dropped receiver only means nobody is watching
                        let _ = sender.send(snapshot);
                    }
                }
                Step::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            }
        }

        report.elapsed = clock.elapsed();
        report.skipped = total - output.len();

        if report.cancelled {
            warn!(
                "Batch cancelled after {} of {} records ({} skipped)",
                output.len(),
                total,
                report.skipped
            );
        } else {
            report.estimated_remaining = Duration::ZERO;
        }

        info!(
            "Processed {} records in {:.1}s: {} matched, {} not matched, {} unresolved",
            report.total,
            report.elapsed.as_secs_f64(),
            report.matched,
            report.unmatched,
            report.unresolved
        );

        Ok((output, report))
    }

    async fn process(&self, row: usize, mut record: AddressRecord, throttle: &Throttle) -> Step {
        if self.cancel.is_cancelled() {
            return Step::Cancelled;
        }

        let address = record.address.trim();
        if address.is_empty() {
            debug!("Row {}: empty address, not geocoding", row + 1);
            return Step::Done { record, resolved: false };
        }

        tokio::select! {
            _ = self.cancel.cancelled() => return Step::Cancelled,
            _ = throttle.acquire() => {}
        }

        let point = match self.geocoder.resolve(address).await {
            Ok(Some(point)) => Some(point),
            Ok(None) => {
                warn!("Row {}: no geocoding result for {:?}", row + 1, address);
                None
            }
            Err(e) => {
                warn!("Row {}: geocoding failed for {:?}: {}", row + 1, address, e);
                None
            }
        };

        let resolved = point.is_some();
        if let Some(point) = point {
            let attributes = self.matcher.match_point(&point);
            record.resolve(point, attributes);
        }

        Step::Done { record, resolved }
    }
}

/// Process `records` with default cancellation and no progress channel.
pub async fn run_batch<G: Geocoder + Sync>(
    records: Vec<AddressRecord>,
    geocoder: &G,
    matcher: &RegionMatcher,
    options: BatchOptions,
) -> Result<(Vec<AddressRecord>, MatchReport), BatchError> {
    BatchRunner::new(geocoder, matcher)
        .with_options(options)
        .run(records)
        .await
}

//! Batch summary report.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Summary of one batch run.
///
/// `total` counts the records present in the output, so
/// `matched + unmatched == total` always holds. Records left unprocessed by
/// a cancellation are counted in `skipped` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Records whose address could not be turned into a point
    pub unresolved: usize,
    pub skipped: usize,
    pub cancelled: bool,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
    #[serde(rename = "estimated_remaining_secs", serialize_with = "as_secs")]
    pub estimated_remaining: Duration,
}

impl MatchReport {
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            total: 0,
            matched: 0,
            unmatched: 0,
            unresolved: 0,
            skipped: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
            estimated_remaining: Duration::ZERO,
        }
    }

    /// Count one processed record.
    pub fn record(&mut self, matched: bool, resolved: bool) {
        self.total += 1;
        if matched {
            self.matched += 1;
        } else {
            self.unmatched += 1;
        }
        if !resolved {
            self.unresolved += 1;
        }
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_stay_consistent() {
        let mut report = MatchReport::empty(Utc::now());
        report.record(true, true);
        report.record(false, true);
        report.record(false, false);

        assert_eq!(report.total, 3);
        assert_eq!(report.matched, 1);
        assert_eq!(report.unmatched, 2);
        assert_eq!(report.unresolved, 1);
    }

    #[test]
    fn test_serializes_durations_as_seconds() {
        let mut report = MatchReport::empty(Utc::now());
        report.elapsed = Duration::from_millis(1500);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed_secs"], 1.5);
        assert_eq!(json["estimated_remaining_secs"], 0.0);
        assert_eq!(json["cancelled"], false);
    }
}

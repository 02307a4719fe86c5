//! Diagnostic data-quality checks. Neither check blocks archival.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::partition::PartitionKey;

/// Missing `fillRecordId`s in one market partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapReport {
    pub partition: String,
    pub first: u64,
    pub last: u64,
    /// Holes between `first` and `last`, as inclusive ranges.
    pub missing: Vec<RangeInclusive<u64>>,
}

impl GapReport {
    /// Checks that `ids` cover `min..=max` with no holes. Logs the outcome
    /// and returns the report when something is missing.
    pub fn check(key: &PartitionKey, ids: impl IntoIterator<Item = u64>) -> Option<Self> {
        let ids: BTreeSet<u64> = ids.into_iter().collect();
        let (&first, &last) = (ids.first()?, ids.last()?);

        let mut missing = Vec::new();
        let mut expected = first;
        for &id in &ids {
            if id > expected {
                missing.push(expected..=id - 1);
            }
            expected = id.saturating_add(1);
        }

        if missing.is_empty() {
            tracing::info!(partition = %key, first, last, "fill record ids contiguous");
            return None;
        }
        let report = Self {
            partition: key.to_string(),
            first,
            last,
            missing,
        };
        tracing::warn!(
            partition = %key,
            first,
            last,
            missing_ids = report.missing_count(),
            ranges = ?report.missing.iter().take(Self::LOGGED_RANGES).collect::<Vec<_>>(),
            "fill record id gap"
        );
        Some(report)
    }

    /// Ranges included in the log line; the count covers the rest.
    const LOGGED_RANGES: usize = 16;

    /// Total number of missing ids across all ranges.
    pub fn missing_count(&self) -> u64 {
        self.missing
            .iter()
            .map(|r| r.end() - r.start() + 1)
            .sum()
    }
}

/// Whether a day's block times reach the start, middle and end of the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeCoverage {
    pub date: NaiveDate,
    /// Checkpoints with no block time within the tolerance.
    pub uncovered: Vec<NaiveTime>,
}

impl TimeCoverage {
    /// Allowed distance from a checkpoint, in seconds.
    pub const TOLERANCE_SECS: i64 = 30 * 60;

    fn checkpoints() -> [NaiveTime; 3] {
        [
            NaiveTime::from_hms_opt(0, 1, 0).unwrap_or(NaiveTime::MIN),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
        ]
    }

    pub fn check(date: NaiveDate, times: impl IntoIterator<Item = NaiveDateTime>) -> Self {
        let times: Vec<NaiveDateTime> = times.into_iter().collect();
        let uncovered = Self::checkpoints()
            .into_iter()
            .filter(|checkpoint| {
                let target = date.and_time(*checkpoint);
                !times
                    .iter()
                    .any(|t| (*t - target).num_seconds().abs() < Self::TOLERANCE_SECS)
            })
            .collect();
        Self { date, uncovered }
    }

    pub fn is_complete(&self) -> bool {
        self.uncovered.is_empty()
    }

    /// Logs a possible data gap; never an error.
    pub fn log(&self) {
        if self.is_complete() {
            tracing::debug!(date = %self.date, "block times cover the day");
        } else {
            tracing::warn!(
                date = %self.date,
                uncovered = ?self.uncovered,
                "no trades near checkpoint, possible missing data"
            );
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::partition::{PartitionTarget, Scope};

    fn key() -> PartitionKey {
        PartitionKey::new(
            "prog",
            PartitionTarget::new(Scope::Market, "SOL-PERP"),
            EventKind::OrderActionRecord,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    #[test]
    fn reports_missing_ids() {
        let gap = GapReport::check(&key(), [1, 2, 4, 5]).unwrap();
        assert_eq!(gap.missing, vec![3..=3]);
        assert_eq!(gap.missing_count(), 1);
        assert_eq!((gap.first, gap.last), (1, 5));

        let gap = GapReport::check(&key(), [10, 7, 9, 13]).unwrap();
        assert_eq!(gap.missing, vec![8..=8, 11..=12]);
        assert_eq!(gap.missing_count(), 3);
    }

    #[test]
    fn outlier_id_is_reported_as_one_range() {
        let gap = GapReport::check(&key(), [1, 2, 1_000_000_000_000]).unwrap();
        assert_eq!(gap.missing, vec![3..=999_999_999_999]);
        assert_eq!(gap.missing_count(), 999_999_999_997);
    }

    #[test]
    fn contiguous_or_empty_ids_report_nothing() {
        assert!(GapReport::check(&key(), [3, 1, 2, 2]).is_none());
        assert!(GapReport::check(&key(), []).is_none());
    }

    #[test]
    fn time_coverage_flags_uncovered_checkpoints() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let at = |h, m| date.and_hms_opt(h, m, 0).unwrap();

        let full = TimeCoverage::check(date, [at(0, 20), at(11, 45), at(23, 40)]);
        assert!(full.is_complete());

        let partial = TimeCoverage::check(date, [at(0, 40), at(12, 10)]);
        assert_eq!(
            partial.uncovered,
            vec![
                NaiveTime::from_hms_opt(0, 1, 0).unwrap(),
                NaiveTime::from_hms_opt(23, 59, 0).unwrap()
            ]
        );
    }
}

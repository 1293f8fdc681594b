//! Query filters and grouping dimensions

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::data::error::DataError;
use crate::data::types::snapshot::{MetricSnapshot, PaymentStatus};

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting an inverted pair
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.start > self.end {
            return Err(DataError::invalid_range(self.start, self.end));
        }
        Ok(())
    }

    /// Number of days covered, counting both endpoints
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Range ending today (UTC) and covering the last `days` days
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(days.saturating_sub(1).max(0));
        Self { start, end }
    }
}

/// Optional row-level filter applied on top of a date range
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotFilter {
    /// Restrict to these garage codes; `None` in the list matches the
    /// fleet-wide rows
    pub garages: Option<Vec<Option<i64>>>,
    /// Restrict status distributions to these buckets
    pub statuses: Option<Vec<PaymentStatus>>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl SnapshotFilter {
    pub fn is_empty(&self) -> bool {
        self.garages.is_none()
            && self.statuses.is_none()
            && self.min_value.is_none()
            && self.max_value.is_none()
    }

    /// Whether a snapshot passes the garage and value bounds.
    ///
    /// Status restrictions do not drop rows; they narrow which buckets a
    /// status grouping emits.
    pub fn matches(&self, snapshot: &MetricSnapshot) -> bool {
        if let Some(garages) = &self.garages
            && !garages.contains(&snapshot.garage_code)
        {
            return false;
        }
        if let Some(min) = self.min_value
            && snapshot.total_value < min
        {
            return false;
        }
        if let Some(max) = self.max_value
            && snapshot.total_value > max
        {
            return false;
        }
        true
    }
}

/// Dimension a set of snapshots can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Status,
    Severity,
    Garage,
    Month,
    Week,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = DateRange::new(d(2024, 3, 10), d(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, DataError::InvalidRange { .. }));
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::new(d(2024, 3, 10), d(2024, 3, 10)).unwrap();
        assert_eq!(range.days(), 1);
        assert!(range.contains(d(2024, 3, 10)));
        assert!(!range.contains(d(2024, 3, 11)));
    }

    #[test]
    fn test_days_counts_both_endpoints() {
        let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 7)).unwrap();
        assert_eq!(range.days(), 7);
    }

    #[test]
    fn test_filter_garage_and_value_bounds() {
        let mut snapshot = MetricSnapshot::empty(d(2024, 3, 1), Some(7));
        snapshot.total_value = 500.0;

        let filter = SnapshotFilter {
            garages: Some(vec![Some(7)]),
            min_value: Some(100.0),
            max_value: Some(1000.0),
            ..Default::default()
        };
        assert!(filter.matches(&snapshot));

        let filter = SnapshotFilter {
            garages: Some(vec![Some(8), None]),
            ..Default::default()
        };
        assert!(!filter.matches(&snapshot));

        let filter = SnapshotFilter {
            max_value: Some(400.0),
            ..Default::default()
        };
        assert!(!filter.matches(&snapshot));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let snapshot = MetricSnapshot::empty(d(2024, 3, 1), None);
        let filter = SnapshotFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&snapshot));
    }
}

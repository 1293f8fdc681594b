//! Storage abstraction for metric snapshots

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::data::error::DataError;
use crate::data::types::{
    DateRange, DateStats, DistributionSlice, MetricSnapshot, MonthlySlice, ValueStats,
};

/// Outcome of a batch upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Backing store for daily metric snapshots
///
/// One row per `(reference_date, garage_code)` pair; `garage_code` of `None`
/// holds the fleet-wide aggregate for the date.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Snapshots inside the range, ordered by date ascending
    async fn find_by_date_range(&self, range: &DateRange)
    -> Result<Vec<MetricSnapshot>, DataError>;

    /// The fleet-wide snapshot for a single date, if present
    async fn find_by_date(&self, date: NaiveDate) -> Result<Option<MetricSnapshot>, DataError>;

    /// Insert or update a batch of snapshots, keyed on `(reference_date,
    /// garage_code)`. Rows that fail validation are counted as failures
    /// without aborting the rest of the batch.
    async fn upsert(&self, snapshots: &[MetricSnapshot]) -> Result<SyncOutcome, DataError>;

    /// Delete all snapshots inside the range, returning the count removed
    async fn delete_by_range(&self, range: &DateRange) -> Result<u64, DataError>;

    /// Delete snapshots strictly older than the cutoff date
    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, DataError>;

    /// Remove every snapshot
    async fn clear(&self) -> Result<u64, DataError>;

    /// Total number of stored snapshots
    async fn count(&self) -> Result<u64, DataError>;

    /// Fine counts summed per payment status across all snapshots
    async fn status_distribution(&self) -> Result<Vec<DistributionSlice>, DataError>;

    /// Fine counts summed per severity tier across all snapshots
    async fn severity_distribution(&self) -> Result<Vec<DistributionSlice>, DataError>;

    /// Fine counts per garage, largest first, capped at `limit`
    async fn garage_distribution(&self, limit: u32) -> Result<Vec<DistributionSlice>, DataError>;

    /// Fine counts and values per calendar month for the trailing window
    async fn monthly_distribution(&self, months: u32) -> Result<Vec<MonthlySlice>, DataError>;

    /// Monetary aggregates over all snapshots
    async fn value_extremes(&self) -> Result<ValueStats, DataError>;

    /// Date coverage and last write time
    async fn date_extremes(&self) -> Result<DateStats, DataError>;
}

impl SyncOutcome {
    /// Fold a per-row result into the outcome
    pub fn record(&mut self, result: RowOutcome) {
        self.processed += 1;
        match result {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Failed => self.failed += 1,
        }
    }
}

/// What happened to a single row during an upsert batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Updated,
    Failed,
}

/// Timestamp helper used by SQLite write paths
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

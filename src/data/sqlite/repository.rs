//! SQLite implementation of the snapshot store

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::data::error::DataError;
use crate::data::traits::{RecordSource, RowOutcome, SyncOutcome, now_millis};
use crate::data::types::{
    DateRange, DateStats, DistributionSlice, MetricSnapshot, MonthlySlice, ValueStats,
};

const SNAPSHOT_COLUMNS: &str = "reference_date, garage_code, garage_name, total_fines, \
     total_value, paid, overdue, pending, light, medium, severe, very_severe, \
     electronic, in_person, average_value, payment_rate";

/// Snapshot store backed by SQLite
///
/// Cross-store aggregates (status, severity, monthly, value) read the
/// fleet-wide rows only; the garage distribution reads the per-garage rows.
/// Counting both would tally every fine twice.
pub struct SqliteRecordSource {
    pool: SqlitePool,
}

impl SqliteRecordSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<MetricSnapshot, sqlx::Error> {
        Ok(MetricSnapshot {
            reference_date: row.try_get("reference_date")?,
            garage_code: row.try_get("garage_code")?,
            garage_name: row.try_get("garage_name")?,
            total_fines: row.try_get("total_fines")?,
            total_value: row.try_get("total_value")?,
            paid: row.try_get("paid")?,
            overdue: row.try_get("overdue")?,
            pending: row.try_get("pending")?,
            light: row.try_get("light")?,
            medium: row.try_get("medium")?,
            severe: row.try_get("severe")?,
            very_severe: row.try_get("very_severe")?,
            electronic: row.try_get("electronic")?,
            in_person: row.try_get("in_person")?,
            average_value: row.try_get("average_value")?,
            payment_rate: row.try_get("payment_rate")?,
        })
    }

    /// Upsert one snapshot inside an open transaction, keyed on
    /// `(reference_date, garage_code)`
    async fn upsert_one(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        snapshot: &MetricSnapshot,
    ) -> Result<RowOutcome, DataError> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM metric_snapshots WHERE reference_date = ? AND garage_code IS ?",
        )
        .bind(snapshot.reference_date)
        .bind(snapshot.garage_code)
        .fetch_optional(&mut **tx)
        .await?;

        let now = now_millis();
        match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE metric_snapshots SET garage_name = ?, total_fines = ?, \
                     total_value = ?, paid = ?, overdue = ?, pending = ?, light = ?, \
                     medium = ?, severe = ?, very_severe = ?, electronic = ?, \
                     in_person = ?, average_value = ?, payment_rate = ?, updated_at = ? \
                     WHERE id = ?",
                )
                .bind(&snapshot.garage_name)
                .bind(snapshot.total_fines)
                .bind(snapshot.total_value)
                .bind(snapshot.paid)
                .bind(snapshot.overdue)
                .bind(snapshot.pending)
                .bind(snapshot.light)
                .bind(snapshot.medium)
                .bind(snapshot.severe)
                .bind(snapshot.very_severe)
                .bind(snapshot.electronic)
                .bind(snapshot.in_person)
                .bind(snapshot.average_value)
                .bind(snapshot.payment_rate)
                .bind(now)
                .bind(id)
                .execute(&mut **tx)
                .await?;
                Ok(RowOutcome::Updated)
            }
            None => {
                sqlx::query(&format!(
                    "INSERT INTO metric_snapshots ({SNAPSHOT_COLUMNS}, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ))
                .bind(snapshot.reference_date)
                .bind(snapshot.garage_code)
                .bind(&snapshot.garage_name)
                .bind(snapshot.total_fines)
                .bind(snapshot.total_value)
                .bind(snapshot.paid)
                .bind(snapshot.overdue)
                .bind(snapshot.pending)
                .bind(snapshot.light)
                .bind(snapshot.medium)
                .bind(snapshot.severe)
                .bind(snapshot.very_severe)
                .bind(snapshot.electronic)
                .bind(snapshot.in_person)
                .bind(snapshot.average_value)
                .bind(snapshot.payment_rate)
                .bind(now)
                .bind(now)
                .execute(&mut **tx)
                .await?;
                Ok(RowOutcome::Inserted)
            }
        }
    }
}

#[async_trait]
impl RecordSource for SqliteRecordSource {
    async fn find_by_date_range(
        &self,
        range: &DateRange,
    ) -> Result<Vec<MetricSnapshot>, DataError> {
        range.validate()?;
        let rows = sqlx::query(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM metric_snapshots \
             WHERE reference_date >= ? AND reference_date <= ? \
             ORDER BY reference_date ASC, garage_code ASC"
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::map_row(row).map_err(DataError::from))
            .collect()
    }

    async fn find_by_date(&self, date: NaiveDate) -> Result<Option<MetricSnapshot>, DataError> {
        let row = sqlx::query(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM metric_snapshots \
             WHERE reference_date = ? AND garage_code IS NULL"
        ))
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_row).transpose().map_err(Into::into)
    }

    async fn upsert(&self, snapshots: &[MetricSnapshot]) -> Result<SyncOutcome, DataError> {
        let mut outcome = SyncOutcome::default();
        if snapshots.is_empty() {
            return Ok(outcome);
        }

        let mut tx = self.pool.begin().await?;
        for snapshot in snapshots {
            if let Err(e) = snapshot.validate() {
                warn!(
                    date = %snapshot.reference_date,
                    garage = ?snapshot.garage_code,
                    error = %e,
                    "skipping invalid snapshot in batch"
                );
                outcome.record(RowOutcome::Failed);
                continue;
            }
            snapshot.check_consistency();
            let row_outcome = Self::upsert_one(&mut tx, snapshot).await?;
            outcome.record(row_outcome);
        }
        tx.commit().await?;

        Ok(outcome)
    }

    async fn delete_by_range(&self, range: &DateRange) -> Result<u64, DataError> {
        range.validate()?;
        let result =
            sqlx::query("DELETE FROM metric_snapshots WHERE reference_date >= ? AND reference_date <= ?")
                .bind(range.start)
                .bind(range.end)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<u64, DataError> {
        let result = sqlx::query("DELETE FROM metric_snapshots WHERE reference_date < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<u64, DataError> {
        let result = sqlx::query("DELETE FROM metric_snapshots")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, DataError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM metric_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn status_distribution(&self) -> Result<Vec<DistributionSlice>, DataError> {
        let row = sqlx::query(
            "SELECT ifnull(SUM(paid), 0) AS paid, ifnull(SUM(overdue), 0) AS overdue, \
             ifnull(SUM(pending), 0) AS pending \
             FROM metric_snapshots WHERE garage_code IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let buckets = [
            ("paid", row.try_get::<i64, _>("paid")?),
            ("overdue", row.try_get::<i64, _>("overdue")?),
            ("pending", row.try_get::<i64, _>("pending")?),
        ];
        Ok(slices_from_buckets(&buckets))
    }

    async fn severity_distribution(&self) -> Result<Vec<DistributionSlice>, DataError> {
        let row = sqlx::query(
            "SELECT ifnull(SUM(light), 0) AS light, ifnull(SUM(medium), 0) AS medium, \
             ifnull(SUM(severe), 0) AS severe, ifnull(SUM(very_severe), 0) AS very_severe \
             FROM metric_snapshots WHERE garage_code IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let buckets = [
            ("light", row.try_get::<i64, _>("light")?),
            ("medium", row.try_get::<i64, _>("medium")?),
            ("severe", row.try_get::<i64, _>("severe")?),
            ("very_severe", row.try_get::<i64, _>("very_severe")?),
        ];
        Ok(slices_from_buckets(&buckets))
    }

    async fn garage_distribution(&self, limit: u32) -> Result<Vec<DistributionSlice>, DataError> {
        let rows = sqlx::query(
            "SELECT COALESCE(garage_name, CAST(garage_code AS TEXT)) AS label, \
             SUM(total_fines) AS count \
             FROM metric_snapshots WHERE garage_code IS NOT NULL \
             GROUP BY garage_code ORDER BY count DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let buckets: Vec<(String, i64)> = rows
            .iter()
            .map(|row| {
                Ok::<_, sqlx::Error>((row.try_get::<String, _>("label")?, row.try_get("count")?))
            })
            .collect::<Result<_, _>>()?;

        let total: i64 = buckets.iter().map(|(_, c)| c).sum();
        Ok(buckets
            .into_iter()
            .map(|(key, count)| DistributionSlice {
                key,
                count,
                percentage: percentage(count, total),
            })
            .collect())
    }

    async fn monthly_distribution(&self, months: u32) -> Result<Vec<MonthlySlice>, DataError> {
        let cutoff = Utc::now().date_naive() - Duration::days(i64::from(months) * 30);
        let rows = sqlx::query(
            "SELECT strftime('%Y-%m', reference_date) AS month, \
             SUM(total_fines) AS count, SUM(total_value) AS value \
             FROM metric_snapshots \
             WHERE garage_code IS NULL AND reference_date >= ? \
             GROUP BY month ORDER BY month ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MonthlySlice {
                    month: row.try_get("month")?,
                    count: row.try_get("count")?,
                    value: row.try_get("value")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(Into::into)
    }

    async fn value_extremes(&self) -> Result<ValueStats, DataError> {
        let row = sqlx::query(
            "SELECT ifnull(SUM(total_value), 0.0) AS total, \
             ifnull(SUM(total_fines), 0) AS fines, \
             ifnull(MAX(total_value), 0.0) AS largest, \
             ifnull(MIN(total_value), 0.0) AS smallest \
             FROM metric_snapshots WHERE garage_code IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let total: f64 = row.try_get("total")?;
        let fines: i64 = row.try_get("fines")?;
        Ok(ValueStats {
            total,
            average: if fines > 0 { total / fines as f64 } else { 0.0 },
            largest: row.try_get("largest")?,
            smallest: row.try_get("smallest")?,
        })
    }

    async fn date_extremes(&self) -> Result<DateStats, DataError> {
        let row = sqlx::query(
            "SELECT MIN(reference_date) AS oldest, MAX(reference_date) AS newest, \
             MAX(updated_at) AS last_updated \
             FROM metric_snapshots",
        )
        .fetch_one(&self.pool)
        .await?;

        let last_updated: Option<i64> = row.try_get("last_updated")?;
        Ok(DateStats {
            oldest: row.try_get("oldest")?,
            newest: row.try_get("newest")?,
            last_updated: last_updated.and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }
}

fn percentage(count: i64, total: i64) -> f64 {
    if total > 0 {
        count as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

fn slices_from_buckets(buckets: &[(&str, i64)]) -> Vec<DistributionSlice> {
    let total: i64 = buckets.iter().map(|(_, c)| c).sum();
    buckets
        .iter()
        .map(|&(key, count)| DistributionSlice {
            key: key.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect()
}

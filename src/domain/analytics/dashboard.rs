//! Write orchestration and dashboard composition
//!
//! [`MetricsService`] owns every write path and invalidates the statistics
//! cache on each one. [`DashboardService`] is a thin composer: it fans out
//! to the aggregator, trend analyzer, ranking engine and statistics cache
//! and assembles their outputs without adding semantics of its own.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::join;
use tracing::{debug, info};

use crate::core::config::EngineConfig;
use crate::data::cache::StatsService;
use crate::data::error::DataError;
use crate::data::traits::{RecordSource, SyncOutcome};
use crate::data::types::{DateRange, MetricSnapshot, StatisticsPayload};
use crate::domain::analytics::aggregate::{
    self, PeriodComparison, PeriodSummary, weekly_growth,
};
use crate::domain::analytics::ranking::{
    RankingEntry, RankingOptions, entity_metrics_from_snapshots, rank,
};
use crate::domain::analytics::trend::{
    AnalyzerOptions, TrendResult, analyze, series_from_snapshots,
};

/// Write-side facade over the snapshot store
///
/// Every mutation invalidates the statistics cache before returning, even
/// when the store reports an error, since a failed batch may still have
/// written rows before failing.
pub struct MetricsService {
    source: Arc<dyn RecordSource>,
    stats: Arc<StatsService>,
    config: EngineConfig,
}

impl MetricsService {
    pub fn new(
        source: Arc<dyn RecordSource>,
        stats: Arc<StatsService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            stats,
            config,
        }
    }

    /// Insert or update a single snapshot
    pub async fn save_snapshot(&self, snapshot: &MetricSnapshot) -> Result<(), DataError> {
        snapshot.validate()?;
        snapshot.check_consistency();
        let result = self.source.upsert(std::slice::from_ref(snapshot)).await;
        self.stats.invalidate();
        result.map(|_| ())
    }

    /// Upsert a batch, counting failures per row instead of aborting
    pub async fn sync_batch(&self, snapshots: &[MetricSnapshot]) -> Result<SyncOutcome, DataError> {
        let result = self.source.upsert(snapshots).await;
        self.stats.invalidate();
        if let Ok(outcome) = &result {
            info!(
                processed = outcome.processed,
                inserted = outcome.inserted,
                updated = outcome.updated,
                failed = outcome.failed,
                "snapshot batch synchronized"
            );
        }
        result
    }

    /// Drop snapshots older than the configured retention window
    pub async fn prune(&self) -> Result<u64, DataError> {
        let cutoff = Utc::now().date_naive() - Duration::days(i64::from(self.config.retention_days));
        let result = self.source.delete_older_than(cutoff).await;
        self.stats.invalidate();
        if let Ok(removed) = &result {
            debug!(cutoff = %cutoff, removed, "old snapshots pruned");
        }
        result
    }

    /// Delete every snapshot inside the range
    pub async fn delete_range(&self, range: &DateRange) -> Result<u64, DataError> {
        range.validate()?;
        let result = self.source.delete_by_range(range).await;
        self.stats.invalidate();
        result
    }

    /// Remove all snapshots
    pub async fn clear(&self) -> Result<u64, DataError> {
        let result = self.source.clear().await;
        self.stats.invalidate();
        result
    }

    /// Whether the newest write is older than the refresh threshold
    ///
    /// An empty store always needs a refresh.
    pub async fn needs_refresh(&self) -> Result<bool, DataError> {
        let dates = self.source.date_extremes().await?;
        Ok(match dates.last_updated {
            Some(last) => {
                let age = Utc::now().signed_duration_since(last);
                age.to_std().map_or(true, |age| age > self.config.refresh_max_age())
            }
            None => true,
        })
    }
}

/// Executive dashboard payload
#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveDashboard {
    pub period: PeriodComparison,
    pub trend: TrendResult,
    pub ranking: Vec<RankingEntry>,
    pub statistics: Arc<StatisticsPayload>,
    /// 0 to 100 composite of payment efficiency, stability and coverage
    pub health_index: f64,
}

/// Projection for the current day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TodayProjection {
    pub expected_fines: f64,
    pub confidence: f64,
    pub based_on_days: usize,
}

/// Realtime dashboard payload
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeDashboard {
    pub today: Option<MetricSnapshot>,
    pub yesterday: Option<MetricSnapshot>,
    pub last_7_days: PeriodSummary,
    pub last_30_days: PeriodSummary,
    pub weekly_growth_pct: f64,
    pub projection: Option<TodayProjection>,
}

/// Read-side composer for dashboard payloads
pub struct DashboardService {
    source: Arc<dyn RecordSource>,
    stats: Arc<StatsService>,
    config: EngineConfig,
}

impl DashboardService {
    pub fn new(
        source: Arc<dyn RecordSource>,
        stats: Arc<StatsService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            stats,
            config,
        }
    }

    /// Compose the executive dashboard for a period
    ///
    /// `garage` narrows the period and trend sections to one garage; the
    /// ranking always spans all garages in the period.
    pub async fn executive_dashboard(
        &self,
        range: &DateRange,
        garage: Option<i64>,
    ) -> Result<ExecutiveDashboard, DataError> {
        range.validate()?;
        let previous = previous_range(range);

        let (current_rows, previous_rows, statistics) = join!(
            aggregate::fetch_range(self.source.as_ref(), range),
            aggregate::fetch_range(self.source.as_ref(), &previous),
            self.stats.get_statistics(false),
        );
        let current_rows = current_rows?;
        let previous_rows = previous_rows?;
        let statistics = statistics?;

        let scoped_current = scope_rows(&current_rows, garage);
        let scoped_previous = scope_rows(&previous_rows, garage);

        let current_summary = aggregate::period_summary(&scoped_current, range);
        let previous_summary = aggregate::period_summary(&scoped_previous, &previous);
        let period = aggregate::compare_periods(current_summary, previous_summary);

        let series = series_from_snapshots(&scoped_current);
        let trend = analyze(
            &series,
            AnalyzerOptions {
                anomaly_window: self.config.anomaly_window,
            },
        );

        let ranking = rank(
            &entity_metrics_from_snapshots(&current_rows),
            &RankingOptions {
                top_n: self.config.ranking_top_n,
                period_days: range.days(),
                ..Default::default()
            },
        );

        let health_index = health_index(&current_summary, trend.stability, series.len(), range);

        Ok(ExecutiveDashboard {
            period,
            trend,
            ranking,
            statistics,
            health_index,
        })
    }

    /// Compose the realtime dashboard around today
    pub async fn realtime_dashboard(&self) -> Result<RealtimeDashboard, DataError> {
        let today = Utc::now().date_naive();
        let yesterday = today - Duration::days(1);
        let last_7 = DateRange::last_days(7);
        let last_30 = DateRange::last_days(30);

        let (today_row, yesterday_row, week_rows, month_rows) = join!(
            self.source.find_by_date(today),
            self.source.find_by_date(yesterday),
            aggregate::fetch_range(self.source.as_ref(), &last_7),
            aggregate::fetch_range(self.source.as_ref(), &last_30),
        );
        let today_row = today_row?;
        let yesterday_row = yesterday_row?;
        let week_fleet = scope_rows(&week_rows?, None);
        let month_fleet = scope_rows(&month_rows?, None);

        Ok(RealtimeDashboard {
            today: today_row,
            yesterday: yesterday_row,
            last_7_days: aggregate::period_summary(&week_fleet, &last_7),
            last_30_days: aggregate::period_summary(&month_fleet, &last_30),
            weekly_growth_pct: weekly_growth(&month_fleet),
            projection: today_projection(&week_fleet, today),
        })
    }
}

/// The period of equal length immediately before `range`
fn previous_range(range: &DateRange) -> DateRange {
    let days = range.days();
    let end = range.start - Duration::days(1);
    DateRange {
        start: end - Duration::days(days - 1),
        end,
    }
}

/// Keep only the rows for one scope: a single garage, or the fleet rows
fn scope_rows(rows: &[MetricSnapshot], garage: Option<i64>) -> Vec<MetricSnapshot> {
    rows.iter()
        .filter(|s| s.garage_code == garage)
        .cloned()
        .collect()
}

/// Expected fines for today from the trailing week, excluding today itself
fn today_projection(week_fleet: &[MetricSnapshot], today: NaiveDate) -> Option<TodayProjection> {
    let history: Vec<&MetricSnapshot> = week_fleet
        .iter()
        .filter(|s| s.reference_date < today)
        .collect();
    if history.is_empty() {
        return None;
    }
    let total: i64 = history.iter().map(|s| s.total_fines).sum();
    Some(TodayProjection {
        expected_fines: (total as f64 / history.len() as f64).round(),
        confidence: 0.7,
        based_on_days: history.len(),
    })
}

/// Composite health score: payment efficiency 40%, series stability 30%,
/// date coverage 30%
fn health_index(
    summary: &PeriodSummary,
    stability: f64,
    days_with_data: usize,
    range: &DateRange,
) -> f64 {
    let coverage = if range.days() > 0 {
        (days_with_data as f64 / range.days() as f64 * 100.0).min(100.0)
    } else {
        0.0
    };
    summary.payment_rate * 0.4 + stability * 0.3 + coverage * 0.3
}

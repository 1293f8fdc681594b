//! End-to-end engine tests over an in-memory SQLite store

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, Utc};
use finemetrics::RecordSource;
use finemetrics::core::EngineConfig;
use finemetrics::data::cache::{StatsCache, StatsService};
use finemetrics::data::sqlite::{SqliteRecordSource, SqliteService};
use finemetrics::data::types::{DateRange, MetricSnapshot};
use finemetrics::domain::analytics::trend::TrendDirection;
use finemetrics::domain::analytics::{DashboardService, MetricsService, PeriodTrend};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

struct Engine {
    _db: SqliteService,
    source: Arc<SqliteRecordSource>,
    stats: Arc<StatsService>,
    metrics: MetricsService,
    dashboard: DashboardService,
}

async fn engine() -> Engine {
    init_tracing();
    let config = EngineConfig::default();
    let db = SqliteService::open_in_memory().await.unwrap();
    let source = Arc::new(SqliteRecordSource::new(db.pool().clone()));
    let cache = Arc::new(StatsCache::new(StdDuration::from_secs(
        config.stats_cache_ttl_secs,
    )));
    let stats = Arc::new(StatsService::new(source.clone(), cache));
    Engine {
        metrics: MetricsService::new(source.clone(), stats.clone(), config.clone()),
        dashboard: DashboardService::new(source.clone(), stats.clone(), config),
        _db: db,
        source,
        stats,
    }
}

fn snapshot(date: NaiveDate, garage: Option<i64>, fines: i64) -> MetricSnapshot {
    let mut s = MetricSnapshot::empty(date, garage);
    s.total_fines = fines;
    s.total_value = fines as f64 * 120.0;
    s.paid = fines * 6 / 10;
    s.pending = fines - s.paid;
    s.light = fines / 2;
    s.medium = fines - fines / 2;
    s.electronic = fines;
    s.average_value = 120.0;
    s.payment_rate = if fines > 0 {
        s.paid as f64 / fines as f64 * 100.0
    } else {
        0.0
    };
    s
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[tokio::test]
async fn sync_then_analyze_a_growing_month() {
    let e = engine().await;

    // Four weeks of growing volume plus two garages on each day
    let mut batch = Vec::new();
    for day in 1..=28 {
        let fines = 10 + i64::from(day) * 2;
        batch.push(snapshot(d(2024, 3, day), None, fines));
        batch.push(snapshot(d(2024, 3, day), Some(1), fines * 7 / 10));
        batch.push(snapshot(d(2024, 3, day), Some(2), fines * 3 / 10));
    }
    let outcome = e.metrics.sync_batch(&batch).await.unwrap();
    assert_eq!(outcome.inserted, 28 * 3);
    assert_eq!(outcome.failed, 0);

    let range = DateRange::new(d(2024, 3, 15), d(2024, 3, 28)).unwrap();
    let dash = e.dashboard.executive_dashboard(&range, None).await.unwrap();

    // Second fortnight beats the first
    assert_eq!(dash.period.trend, PeriodTrend::Growth);
    assert!(dash.period.fines_variation_pct > 5.0);

    // Smooth linear growth: no anomalies, projection present
    assert!(dash.trend.anomalies.is_empty());
    let projection = dash.trend.projection.unwrap();
    assert!(projection.next_week >= projection.next_day);

    assert_eq!(dash.ranking[0].key, 1);
    assert_eq!(dash.ranking[0].position, 1);

    assert_eq!(dash.statistics.total_records, 28 * 3);
    assert_eq!(dash.statistics.distribution.by_garage.len(), 2);
}

#[tokio::test]
async fn upsert_is_idempotent_per_date_and_garage() {
    let e = engine().await;
    let day = d(2024, 3, 10);

    e.metrics.save_snapshot(&snapshot(day, None, 10)).await.unwrap();
    e.metrics.save_snapshot(&snapshot(day, None, 14)).await.unwrap();
    e.metrics.save_snapshot(&snapshot(day, Some(1), 4)).await.unwrap();

    assert_eq!(e.source.count().await.unwrap(), 2);
    let stored = e.source.find_by_date(day).await.unwrap().unwrap();
    assert_eq!(stored.total_fines, 14);
}

#[tokio::test]
async fn statistics_track_every_write_path() {
    let e = engine().await;
    let day = d(2024, 3, 10);

    e.metrics.save_snapshot(&snapshot(day, None, 10)).await.unwrap();
    assert_eq!(e.stats.get_statistics(false).await.unwrap().total_records, 1);

    e.metrics
        .sync_batch(&[snapshot(d(2024, 3, 11), None, 10), snapshot(d(2024, 3, 12), None, 10)])
        .await
        .unwrap();
    assert_eq!(e.stats.get_statistics(false).await.unwrap().total_records, 3);

    let range = DateRange::new(d(2024, 3, 11), d(2024, 3, 11)).unwrap();
    e.metrics.delete_range(&range).await.unwrap();
    assert_eq!(e.stats.get_statistics(false).await.unwrap().total_records, 2);

    e.metrics.clear().await.unwrap();
    let payload = e.stats.get_statistics(false).await.unwrap();
    assert_eq!(payload.total_records, 0);
    assert!(payload.dates.oldest.is_none());
}

#[tokio::test]
async fn declining_series_reports_decline_and_floors_projections() {
    let e = engine().await;
    let mut batch = Vec::new();
    for day in 1..=14 {
        let fines = 200 - i64::from(day) * 14;
        batch.push(snapshot(d(2024, 3, day), None, fines.max(1)));
    }
    e.metrics.sync_batch(&batch).await.unwrap();

    let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 14)).unwrap();
    let dash = e.dashboard.executive_dashboard(&range, None).await.unwrap();

    assert_eq!(dash.trend.direction, TrendDirection::Declining);
    let projection = dash.trend.projection.unwrap();
    assert!(projection.next_month >= 0.0);
}

#[tokio::test]
async fn realtime_view_survives_sparse_history() {
    let e = engine().await;
    let today = Utc::now().date_naive();

    // Only three scattered days in the last week
    e.metrics
        .sync_batch(&[
            snapshot(today - Duration::days(1), None, 12),
            snapshot(today - Duration::days(3), None, 9),
            snapshot(today - Duration::days(5), None, 15),
        ])
        .await
        .unwrap();

    let dash = e.dashboard.realtime_dashboard().await.unwrap();
    assert!(dash.today.is_none());
    assert_eq!(dash.yesterday.unwrap().total_fines, 12);
    assert_eq!(dash.last_7_days.total_fines, 36);

    let projection = dash.projection.unwrap();
    assert_eq!(projection.based_on_days, 3);
    assert_eq!(projection.expected_fines, 12.0);
}

#[tokio::test]
async fn invalid_rows_do_not_poison_a_batch() {
    let e = engine().await;
    let mut bad = snapshot(d(2024, 3, 11), None, 10);
    bad.total_value = -5.0;

    let outcome = e
        .metrics
        .sync_batch(&[snapshot(d(2024, 3, 10), None, 10), bad])
        .await
        .unwrap();
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.failed, 1);

    assert_eq!(e.stats.get_statistics(false).await.unwrap().total_records, 1);
}

//! Memoized statistics payload
//!
//! The full statistics payload touches every row in the store, so it is
//! computed at most once per TTL. Every write path invalidates the slot
//! synchronously before returning.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::try_join;
use tracing::{debug, trace};

use crate::core::constants::{ESTIMATED_ROW_KB, OCCUPANCY_BASE_ROWS};
use crate::data::error::DataError;
use crate::data::traits::RecordSource;
use crate::data::types::{Distributions, PerformanceEstimate, StatisticsPayload};

struct CachedStats {
    payload: Arc<StatisticsPayload>,
    computed_at: Instant,
}

/// Single-slot TTL cache for the statistics payload
pub struct StatsCache {
    slot: Mutex<Option<CachedStats>>,
    ttl: Duration,
}

impl StatsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CachedStats>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The cached payload, if present and younger than the TTL
    pub fn get_fresh(&self) -> Option<Arc<StatisticsPayload>> {
        let guard = self.lock();
        guard
            .as_ref()
            .filter(|cached| cached.computed_at.elapsed() < self.ttl)
            .map(|cached| Arc::clone(&cached.payload))
    }

    pub fn store(&self, payload: Arc<StatisticsPayload>) {
        *self.lock() = Some(CachedStats {
            payload,
            computed_at: Instant::now(),
        });
    }

    /// Drop the cached payload. Synchronous so write paths can call it
    /// without awaiting.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    pub fn is_fresh(&self) -> bool {
        self.get_fresh().is_some()
    }
}

/// Computes and serves the statistics payload
pub struct StatsService {
    source: Arc<dyn RecordSource>,
    cache: Arc<StatsCache>,
    /// Serializes recomputation so concurrent misses run one query set
    recompute: tokio::sync::Mutex<()>,
}

impl StatsService {
    pub fn new(source: Arc<dyn RecordSource>, cache: Arc<StatsCache>) -> Self {
        Self {
            source,
            cache,
            recompute: tokio::sync::Mutex::new(()),
        }
    }

    /// The statistics payload, recomputed when the cache is cold or
    /// `force_refresh` is set
    pub async fn get_statistics(
        &self,
        force_refresh: bool,
    ) -> Result<Arc<StatisticsPayload>, DataError> {
        if !force_refresh
            && let Some(payload) = self.cache.get_fresh()
        {
            trace!("statistics cache hit");
            return Ok(payload);
        }

        let _guard = self.recompute.lock().await;
        // Another task may have recomputed while we waited for the guard
        if !force_refresh
            && let Some(payload) = self.cache.get_fresh()
        {
            return Ok(payload);
        }

        let start = Instant::now();
        let payload = Arc::new(self.compute().await?);
        self.cache.store(Arc::clone(&payload));
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            records = payload.total_records,
            "statistics payload recomputed"
        );
        Ok(payload)
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    async fn compute(&self) -> Result<StatisticsPayload, DataError> {
        let limit = crate::core::constants::DEFAULT_GARAGE_DISTRIBUTION_LIMIT;
        let months = crate::core::constants::DEFAULT_MONTHLY_DISTRIBUTION_MONTHS;

        let (total_records, by_status, by_severity, by_garage, by_month, values, dates) = try_join!(
            self.source.count(),
            self.source.status_distribution(),
            self.source.severity_distribution(),
            self.source.garage_distribution(limit),
            self.source.monthly_distribution(months),
            self.source.value_extremes(),
            self.source.date_extremes(),
        )?;

        Ok(StatisticsPayload {
            total_records,
            distribution: Distributions {
                by_status,
                by_garage,
                by_severity,
                by_month,
            },
            values,
            dates,
            performance: performance_estimate(total_records),
        })
    }
}

fn performance_estimate(total_records: u64) -> PerformanceEstimate {
    let occupancy = total_records as f64 / OCCUPANCY_BASE_ROWS as f64 * 100.0;
    PerformanceEstimate {
        avg_row_kb: ESTIMATED_ROW_KB,
        occupancy_pct: occupancy.min(100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::{SqliteRecordSource, SqliteService};
    use crate::data::types::MetricSnapshot;
    use chrono::NaiveDate;

    async fn service() -> (SqliteService, Arc<SqliteRecordSource>, StatsService) {
        let db = SqliteService::open_in_memory().await.unwrap();
        let source = Arc::new(SqliteRecordSource::new(db.pool().clone()));
        let cache = Arc::new(StatsCache::new(Duration::from_secs(1800)));
        let stats = StatsService::new(source.clone(), cache);
        (db, source, stats)
    }

    fn snapshot(day: u32, fines: i64) -> MetricSnapshot {
        let mut s =
            MetricSnapshot::empty(NaiveDate::from_ymd_opt(2024, 3, day).unwrap(), None);
        s.total_fines = fines;
        s.total_value = fines as f64 * 100.0;
        s.paid = fines;
        s.payment_rate = 100.0;
        s
    }

    #[test]
    fn test_cache_slot_ttl_and_invalidate() {
        let cache = StatsCache::new(Duration::from_secs(60));
        assert!(!cache.is_fresh());

        cache.store(Arc::new(StatisticsPayload::default()));
        assert!(cache.is_fresh());

        cache.invalidate();
        assert!(!cache.is_fresh());
    }

    #[test]
    fn test_zero_ttl_is_always_stale() {
        let cache = StatsCache::new(Duration::ZERO);
        cache.store(Arc::new(StatisticsPayload::default()));
        assert!(cache.get_fresh().is_none());
    }

    #[test]
    fn test_performance_estimate_caps_at_100() {
        let estimate = performance_estimate(50_000);
        assert!((estimate.occupancy_pct - 50.0).abs() < 1e-9);

        let estimate = performance_estimate(2_000_000);
        assert_eq!(estimate.occupancy_pct, 100.0);
    }

    #[tokio::test]
    async fn test_compute_and_memoize() {
        let (_db, source, stats) = service().await;
        source.upsert(&[snapshot(10, 4), snapshot(11, 6)]).await.unwrap();

        let payload = stats.get_statistics(false).await.unwrap();
        assert_eq!(payload.total_records, 2);
        assert_eq!(payload.values.total, 1000.0);

        // Second call serves the same Arc from the cache
        let again = stats.get_statistics(false).await.unwrap();
        assert!(Arc::ptr_eq(&payload, &again));
    }

    #[tokio::test]
    async fn test_force_refresh_sees_new_writes() {
        let (_db, source, stats) = service().await;
        source.upsert(&[snapshot(10, 4)]).await.unwrap();

        let payload = stats.get_statistics(false).await.unwrap();
        assert_eq!(payload.total_records, 1);

        source.upsert(&[snapshot(11, 6)]).await.unwrap();
        // Without invalidation the stale payload is still served
        let stale = stats.get_statistics(false).await.unwrap();
        assert_eq!(stale.total_records, 1);

        let fresh = stats.get_statistics(true).await.unwrap();
        assert_eq!(fresh.total_records, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let (_db, source, stats) = service().await;
        source.upsert(&[snapshot(10, 4)]).await.unwrap();
        stats.get_statistics(false).await.unwrap();

        source.upsert(&[snapshot(11, 6)]).await.unwrap();
        stats.invalidate();

        let payload = stats.get_statistics(false).await.unwrap();
        assert_eq!(payload.total_records, 2);
    }
}

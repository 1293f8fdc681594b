//! Time-series metrics engine for traffic-fine back offices
//!
//! Stores pre-aggregated daily snapshots of fine activity in SQLite and
//! serves analytics over them: period aggregation, least-squares trend
//! analysis with anomaly detection, garage rankings and a memoized
//! store-wide statistics payload, composed into executive and realtime
//! dashboard views.
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use finemetrics::core::EngineConfig;
//! use finemetrics::data::cache::{StatsCache, StatsService};
//! use finemetrics::data::sqlite::{SqliteRecordSource, SqliteService};
//! use finemetrics::domain::analytics::{DashboardService, MetricsService};
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let config = EngineConfig::from_env()?;
//! let db = SqliteService::open(std::path::Path::new("finemetrics.db")).await?;
//! let source = Arc::new(SqliteRecordSource::new(db.pool().clone()));
//! let cache = Arc::new(StatsCache::new(config.stats_cache_ttl()));
//! let stats = Arc::new(StatsService::new(source.clone(), cache));
//!
//! let metrics = MetricsService::new(source.clone(), stats.clone(), config.clone());
//! let dashboards = DashboardService::new(source, stats, config);
//! # let _ = (metrics, dashboards);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod data;
pub mod domain;

pub use crate::core::EngineConfig;
pub use data::{DataError, RecordSource, StatsCache, StatsService, SyncOutcome};
pub use domain::analytics::{DashboardService, MetricsService};

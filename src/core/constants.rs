//! Engine-wide constants

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "finemetrics.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "FINEMETRICS_CONFIG";

/// Environment variable overriding the statistics cache TTL (seconds)
pub const ENV_STATS_TTL_SECS: &str = "FINEMETRICS_STATS_TTL_SECS";

/// Environment variable overriding the snapshot retention window (days)
pub const ENV_RETENTION_DAYS: &str = "FINEMETRICS_RETENTION_DAYS";

// =============================================================================
// Statistics Cache
// =============================================================================

/// Default TTL for the memoized statistics payload - 30 minutes
pub const DEFAULT_STATS_CACHE_TTL_SECS: u64 = 1800;

// =============================================================================
// Trend Analyzer
// =============================================================================

/// Slope band inside which a series is classified as stable
pub const TREND_STABLE_BAND: f64 = 0.1;

/// Minimum number of points required for anomaly detection
pub const ANOMALY_MIN_POINTS: usize = 7;

/// |z| above which a point is flagged as an anomaly
pub const ANOMALY_Z_THRESHOLD: f64 = 2.0;

/// |z| above which an anomaly is tagged high severity
pub const ANOMALY_Z_SEVERE: f64 = 3.0;

/// Minimum number of points required for projections
pub const PROJECTION_MIN_POINTS: usize = 7;

/// Coefficient of variation (percent) above which stability bottoms out at 0
pub const STABILITY_VARIABILITY_CUTOFF: f64 = 50.0;

// =============================================================================
// Ranking
// =============================================================================

/// Fine count thresholds for the four performance tiers
pub const TIER_EXCELLENT_MIN: i64 = 100;
pub const TIER_GOOD_MIN: i64 = 50;
pub const TIER_REGULAR_MIN: i64 = 20;

/// Default leaderboard size
pub const DEFAULT_RANKING_TOP_N: usize = 10;

// =============================================================================
// Statistics Payload
// =============================================================================

/// Default number of garages reported in the garage distribution
pub const DEFAULT_GARAGE_DISTRIBUTION_LIMIT: u32 = 20;

/// Default number of trailing months in the monthly distribution
pub const DEFAULT_MONTHLY_DISTRIBUTION_MONTHS: u32 = 12;

/// Estimated storage per snapshot row in KB (for the performance block)
pub const ESTIMATED_ROW_KB: f64 = 5.0;

/// Row count treated as 100% occupancy in the performance estimate
pub const OCCUPANCY_BASE_ROWS: u64 = 100_000;

// =============================================================================
// Retention / Refresh
// =============================================================================

/// Default retention window for daily snapshots
pub const DEFAULT_RETENTION_DAYS: u32 = 365;

/// Default maximum snapshot age before an aggregation refresh is due
pub const DEFAULT_REFRESH_MAX_AGE_HOURS: u64 = 6;

// =============================================================================
// Read Path
// =============================================================================

/// Timeout for read-path snapshot queries
pub const FETCH_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Period Comparison
// =============================================================================

/// Percent variation band inside which two periods compare as stable
pub const PERIOD_STABLE_BAND_PCT: f64 = 5.0;

// =============================================================================
// SQLite
// =============================================================================

/// Database file name
pub const SQLITE_DB_FILENAME: &str = "finemetrics.db";

/// Maximum connections in the SQLite pool
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite page cache size pragma (negative = KB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

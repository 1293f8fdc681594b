//! Engine configuration
//!
//! Loaded from a JSON file (`finemetrics.json`) with environment variable
//! overrides; every field has a sensible default so embedding the engine
//! requires no configuration at all.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_GARAGE_DISTRIBUTION_LIMIT, DEFAULT_MONTHLY_DISTRIBUTION_MONTHS,
    DEFAULT_RANKING_TOP_N, DEFAULT_REFRESH_MAX_AGE_HOURS, DEFAULT_RETENTION_DAYS,
    DEFAULT_STATS_CACHE_TTL_SECS, ENV_CONFIG, ENV_RETENTION_DAYS, ENV_STATS_TTL_SECS,
};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// TTL for the memoized statistics payload, in seconds
    pub stats_cache_ttl_secs: u64,

    /// Trailing window for anomaly detection; `None` evaluates each point
    /// against the whole series (the historical behavior)
    pub anomaly_window: Option<usize>,

    /// Snapshots older than this many days are eligible for pruning
    pub retention_days: u32,

    /// Default leaderboard size for dashboard rankings
    pub ranking_top_n: usize,

    /// Maximum snapshot age before an aggregation refresh is considered due
    pub refresh_max_age_hours: u64,

    /// Number of garages reported in the statistics garage distribution
    pub garage_distribution_limit: u32,

    /// Number of trailing months in the statistics monthly distribution
    pub monthly_distribution_months: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stats_cache_ttl_secs: DEFAULT_STATS_CACHE_TTL_SECS,
            anomaly_window: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            ranking_top_n: DEFAULT_RANKING_TOP_N,
            refresh_max_age_hours: DEFAULT_REFRESH_MAX_AGE_HOURS,
            garage_distribution_limit: DEFAULT_GARAGE_DISTRIBUTION_LIMIT,
            monthly_distribution_months: DEFAULT_MONTHLY_DISTRIBUTION_MONTHS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Build configuration from defaults plus environment overrides
    ///
    /// If `FINEMETRICS_CONFIG` points at a file, that file is loaded first.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(ENV_CONFIG) {
            Ok(path) => Self::load(&PathBuf::from(path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENV_STATS_TTL_SECS)
            && let Ok(secs) = raw.parse()
        {
            self.stats_cache_ttl_secs = secs;
        }
        if let Ok(raw) = std::env::var(ENV_RETENTION_DAYS)
            && let Ok(days) = raw.parse()
        {
            self.retention_days = days;
        }
    }

    /// Statistics cache TTL as a [`Duration`]
    pub fn stats_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_cache_ttl_secs)
    }

    /// Refresh threshold as a [`Duration`]
    pub fn refresh_max_age(&self) -> Duration {
        Duration::from_secs(self.refresh_max_age_hours * 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.stats_cache_ttl_secs, 1800);
        assert_eq!(config.anomaly_window, None);
        assert_eq!(config.retention_days, 365);
        assert_eq!(config.ranking_top_n, 10);
        assert_eq!(config.stats_cache_ttl(), Duration::from_secs(1800));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"stats_cache_ttl_secs": 60, "anomaly_window": 14}"#).unwrap();
        assert_eq!(config.stats_cache_ttl_secs, 60);
        assert_eq!(config.anomaly_window, Some(14));
        assert_eq!(config.retention_days, 365);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finemetrics.json");
        fs::write(&path, r#"{"ranking_top_n": 5}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.ranking_top_n, 5);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = EngineConfig::load(Path::new("/nonexistent/finemetrics.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_refresh_max_age() {
        let config = EngineConfig::default();
        assert_eq!(config.refresh_max_age(), Duration::from_secs(6 * 3600));
    }
}

//! Unified error type for the data layer

use chrono::NaiveDate;
use thiserror::Error;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Inverted date range - rejected immediately, never retried
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Snapshot failed hard validation (negative counts, out-of-range rate)
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// SQLite record source error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Conflict error (e.g., unsupported schema version)
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl DataError {
    /// Create an invalid-range error
    pub fn invalid_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self::InvalidRange { start, end }
    }

    /// True for caller mistakes that should never be retried
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidRange { .. } | Self::InvalidSnapshot(_))
    }

    /// Check if this is a connection-related error that might be transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_display() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = DataError::invalid_range(start, end);
        assert_eq!(
            err.to_string(),
            "invalid date range: start 2024-03-10 is after end 2024-03-01"
        );
        assert!(err.is_validation());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_invalid_snapshot_is_validation() {
        let err = DataError::InvalidSnapshot("total_fines cannot be negative".into());
        assert!(err.is_validation());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err = DataError::Sqlite(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
        assert!(!err.is_validation());
    }
}

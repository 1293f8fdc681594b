//! Data types shared across the engine

pub mod filters;
pub mod snapshot;
pub mod stats;

pub use filters::{DateRange, GroupBy, SnapshotFilter};
pub use snapshot::{IssueChannel, MetricSnapshot, PaymentStatus, SeverityTier};
pub use stats::{
    DateStats, DistributionSlice, Distributions, MonthlySlice, PerformanceEstimate,
    StatisticsPayload, ValueStats,
};

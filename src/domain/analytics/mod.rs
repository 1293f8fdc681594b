//! Analytics: aggregation, trend analysis, ranking and dashboards

pub mod aggregate;
pub mod dashboard;
pub mod ranking;
pub mod trend;

pub use aggregate::{GroupSummary, PeriodComparison, PeriodSummary, PeriodTrend};
pub use dashboard::{DashboardService, ExecutiveDashboard, MetricsService, RealtimeDashboard};
pub use ranking::{PerformanceTier, RankingEntry, RankingOptions, TieBreak};
pub use trend::{Anomaly, AnalyzerOptions, Projection, TrendDirection, TrendResult};

//! Statistics payload served to dashboards

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// One bucket of a categorical distribution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSlice {
    pub key: String,
    pub count: i64,
    /// Share of the total, 0 to 100
    pub percentage: f64,
}

/// One month of the monthly distribution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySlice {
    /// Calendar month key, e.g. `2024-03`
    pub month: String,
    pub count: i64,
    pub value: f64,
}

/// Categorical distributions over the whole store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Distributions {
    pub by_status: Vec<DistributionSlice>,
    pub by_garage: Vec<DistributionSlice>,
    pub by_severity: Vec<DistributionSlice>,
    pub by_month: Vec<MonthlySlice>,
}

/// Monetary aggregates over all snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValueStats {
    pub total: f64,
    pub average: f64,
    pub largest: f64,
    pub smallest: f64,
}

/// Date coverage of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateStats {
    pub oldest: Option<NaiveDate>,
    pub newest: Option<NaiveDate>,
    /// Most recent write, used to decide whether a refresh is due
    pub last_updated: Option<DateTime<Utc>>,
}

/// Rough storage footprint estimate
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceEstimate {
    /// Estimated size per snapshot row in KB
    pub avg_row_kb: f64,
    /// Occupancy against the nominal capacity, capped at 100
    pub occupancy_pct: f64,
}

/// Full statistics payload, memoized by the statistics cache
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsPayload {
    pub total_records: u64,
    pub distribution: Distributions,
    pub values: ValueStats,
    pub dates: DateStats,
    pub performance: PerformanceEstimate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serializes() {
        let payload = StatisticsPayload {
            total_records: 3,
            distribution: Distributions {
                by_status: vec![DistributionSlice {
                    key: "paid".into(),
                    count: 2,
                    percentage: 66.7,
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["total_records"], 3);
        assert_eq!(json["distribution"]["by_status"][0]["key"], "paid");
        assert!(json["dates"]["oldest"].is_null());
    }
}

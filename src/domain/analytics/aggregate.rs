//! Aggregation over daily snapshots
//!
//! Pure functions that fold a slice of snapshots into grouped or period
//! summaries. Fetching is the only async step; everything downstream works
//! on in-memory data.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::warn;

use crate::core::constants::{FETCH_TIMEOUT_SECS, PERIOD_STABLE_BAND_PCT};
use crate::data::error::DataError;
use crate::data::traits::RecordSource;
use crate::data::types::{
    DateRange, GroupBy, MetricSnapshot, PaymentStatus, SeverityTier, SnapshotFilter,
};

/// Fetch the snapshots for a range
///
/// An inverted range is a caller error and propagates; a storage failure or
/// timeout is logged and degrades to an empty series so dashboards render
/// with gaps instead of failing outright. Write paths talk to the source
/// directly and keep their errors.
pub async fn fetch_range(
    source: &dyn RecordSource,
    range: &DateRange,
) -> Result<Vec<MetricSnapshot>, DataError> {
    range.validate()?;
    let query = source.find_by_date_range(range);
    match timeout(Duration::from_secs(FETCH_TIMEOUT_SECS), query).await {
        Ok(Ok(snapshots)) => Ok(snapshots),
        Ok(Err(e)) if e.is_validation() => Err(e),
        Ok(Err(e)) => {
            warn!(start = %range.start, end = %range.end, error = %e, "snapshot fetch failed, serving empty series");
            Ok(Vec::new())
        }
        Err(_) => {
            warn!(start = %range.start, end = %range.end, "snapshot fetch timed out, serving empty series");
            Ok(Vec::new())
        }
    }
}

/// Aggregate for one group of a grouped summary
///
/// For garage, month and week groups `count` accumulates `total_fines` and
/// the value fields describe the per-snapshot `total_value`. For status and
/// severity groups both describe the per-snapshot bucket counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    /// Snapshots contributing to this group
    pub samples: usize,
    pub count: i64,
    pub sum: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// Group snapshots along one dimension
///
/// Groups come back sorted by key; status and severity groups keep their
/// natural bucket order instead.
pub fn grouped_summary(
    snapshots: &[MetricSnapshot],
    group_by: GroupBy,
    filter: &SnapshotFilter,
) -> Vec<GroupSummary> {
    let rows: Vec<&MetricSnapshot> = snapshots.iter().filter(|s| filter.matches(s)).collect();

    match group_by {
        GroupBy::Status => {
            let statuses: Vec<PaymentStatus> = match &filter.statuses {
                Some(statuses) => statuses.clone(),
                None => PaymentStatus::ALL.to_vec(),
            };
            statuses
                .iter()
                .map(|status| {
                    fold_measure(
                        status.label().to_string(),
                        rows.iter().map(|s| s.status_count(*status) as f64),
                    )
                })
                .collect()
        }
        GroupBy::Severity => SeverityTier::ALL
            .iter()
            .map(|tier| {
                fold_measure(
                    tier.label().to_string(),
                    rows.iter().map(|s| s.severity_count(*tier) as f64),
                )
            })
            .collect(),
        GroupBy::Garage => fold_keyed(&rows, |s| {
            s.garage_name.clone().unwrap_or_else(|| {
                s.garage_code
                    .map_or_else(|| "fleet".to_string(), |code| code.to_string())
            })
        }),
        GroupBy::Month => fold_keyed(&rows, |s| s.month_key()),
        GroupBy::Week => fold_keyed(&rows, |s| s.week_key()),
    }
}

/// Fold one measure series into a summary where `count` is the rounded sum
fn fold_measure(key: String, values: impl Iterator<Item = f64>) -> GroupSummary {
    let mut summary = GroupSummary {
        key,
        samples: 0,
        count: 0,
        sum: 0.0,
        average: 0.0,
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };
    for value in values {
        summary.samples += 1;
        summary.sum += value;
        summary.min = summary.min.min(value);
        summary.max = summary.max.max(value);
    }
    if summary.samples == 0 {
        summary.min = 0.0;
        summary.max = 0.0;
    } else {
        summary.average = summary.sum / summary.samples as f64;
    }
    summary.count = summary.sum.round() as i64;
    summary
}

/// Group by a derived key, counting fines and describing total_value
fn fold_keyed(
    rows: &[&MetricSnapshot],
    key_fn: impl Fn(&MetricSnapshot) -> String,
) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<String, Vec<&MetricSnapshot>> = BTreeMap::new();
    for &snapshot in rows {
        groups.entry(key_fn(snapshot)).or_default().push(snapshot);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut summary =
                fold_measure(key, members.iter().map(|s| s.total_value));
            summary.count = members.iter().map(|s| s.total_fines).sum();
            summary
        })
        .collect()
}

/// Flat aggregate over one period
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub days: i64,
    pub total_fines: i64,
    pub total_value: f64,
    pub average_value: f64,
    /// Percentage of fines paid, 0 to 100
    pub payment_rate: f64,
    pub fines_per_day: f64,
}

/// Fold a period of snapshots into one summary
///
/// Averages divide the summed totals rather than averaging per-day rates,
/// so low-volume days do not skew the result.
pub fn period_summary(snapshots: &[MetricSnapshot], range: &DateRange) -> PeriodSummary {
    let total_fines: i64 = snapshots.iter().map(|s| s.total_fines).sum();
    let total_value: f64 = snapshots.iter().map(|s| s.total_value).sum();
    let paid: i64 = snapshots.iter().map(|s| s.paid).sum();
    let days = range.days();

    PeriodSummary {
        days,
        total_fines,
        total_value,
        average_value: if total_fines > 0 {
            total_value / total_fines as f64
        } else {
            0.0
        },
        payment_rate: if total_fines > 0 {
            paid as f64 / total_fines as f64 * 100.0
        } else {
            0.0
        },
        fines_per_day: if days > 0 {
            total_fines as f64 / days as f64
        } else {
            0.0
        },
    }
}

/// Direction of a period-over-period comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodTrend {
    Growth,
    Stable,
    Decline,
}

/// Two periods side by side with their percent variations
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub current: PeriodSummary,
    pub previous: PeriodSummary,
    pub fines_variation_pct: f64,
    pub value_variation_pct: f64,
    pub trend: PeriodTrend,
}

/// Compare a period against its predecessor
pub fn compare_periods(current: PeriodSummary, previous: PeriodSummary) -> PeriodComparison {
    let fines_variation_pct = variation(current.total_fines as f64, previous.total_fines as f64);
    let value_variation_pct = variation(current.total_value, previous.total_value);

    let trend = if fines_variation_pct > PERIOD_STABLE_BAND_PCT {
        PeriodTrend::Growth
    } else if fines_variation_pct < -PERIOD_STABLE_BAND_PCT {
        PeriodTrend::Decline
    } else {
        PeriodTrend::Stable
    };

    PeriodComparison {
        current,
        previous,
        fines_variation_pct,
        value_variation_pct,
        trend,
    }
}

/// Percent variation against a baseline
///
/// A zero baseline compares as +100% when anything appeared and 0% when
/// nothing did, so empty history never divides by zero.
pub fn variation(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 { 100.0 } else { 0.0 }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Growth of the trailing week against the opening week of the series
///
/// Needs at least 14 snapshots; shorter series report 0.
pub fn weekly_growth(snapshots: &[MetricSnapshot]) -> f64 {
    if snapshots.len() < 14 {
        return 0.0;
    }
    let first: i64 = snapshots[..7].iter().map(|s| s.total_fines).sum();
    let last: i64 = snapshots[snapshots.len() - 7..]
        .iter()
        .map(|s| s.total_fines)
        .sum();
    variation(last as f64, first as f64)
}

//! Trend analysis over a daily series
//!
//! Pure functions over an in-memory series: least-squares slope, z-score
//! anomalies, weekday and monthly seasonality, and short-range projections.
//! Degenerate inputs (short series, zero variance) always degrade to neutral
//! values instead of erroring.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::core::constants::{
    ANOMALY_MIN_POINTS, ANOMALY_Z_SEVERE, ANOMALY_Z_THRESHOLD, PROJECTION_MIN_POINTS,
    STABILITY_VARIABILITY_CUTOFF, TREND_STABLE_BAND,
};
use crate::data::types::MetricSnapshot;

const WEEKDAY_LABELS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTH_LABELS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// One point of the analyzed series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub value: f64,
    pub date: Option<NaiveDate>,
}

impl SeriesPoint {
    pub fn new(value: f64) -> Self {
        Self { value, date: None }
    }

    pub fn dated(value: f64, date: NaiveDate) -> Self {
        Self {
            value,
            date: Some(date),
        }
    }
}

/// Daily fine counts as an analyzable series
pub fn series_from_snapshots(snapshots: &[MetricSnapshot]) -> Vec<SeriesPoint> {
    snapshots
        .iter()
        .map(|s| SeriesPoint::dated(s.total_fines as f64, s.reference_date))
        .collect()
}

/// Tuning knobs for [`analyze`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerOptions {
    /// Trailing window for anomaly detection; `None` scores each point
    /// against the whole series
    pub anomaly_window: Option<usize>,
}

/// Overall direction of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Growing,
    Stable,
    Declining,
}

/// Shape of an anomalous point relative to its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Spike,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Medium,
    High,
}

/// A point that strayed beyond the z-score threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub index: usize,
    pub date: Option<NaiveDate>,
    pub value: f64,
    /// Baseline mean the point was scored against
    pub mean: f64,
    pub z_score: f64,
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
}

/// Mean and volume for one seasonal bucket (weekday or month)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalBucket {
    pub label: &'static str,
    pub mean: f64,
    pub total: f64,
    pub samples: usize,
}

/// Weekday and monthly seasonal profiles
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Seasonality {
    pub by_weekday: Vec<SeasonalBucket>,
    pub by_month: Vec<SeasonalBucket>,
}

/// Short-range projections from the latest value and the fitted slope
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub next_day: f64,
    pub next_week: f64,
    pub next_month: f64,
    /// 0 to 1, from series variability with a short-series floor
    pub confidence: f64,
}

/// Full trend analysis of one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// Least-squares slope of the fitted line, change per step
    pub slope: f64,
    pub variability_pct: f64,
    /// 0 (chaotic) to 100 (flat)
    pub stability: f64,
    pub anomalies: Vec<Anomaly>,
    pub seasonality: Seasonality,
    pub projection: Option<Projection>,
    pub recommendations: Vec<String>,
}

/// Least-squares slope of the series, change per step
///
/// Fewer than two points or a degenerate denominator report 0.
pub fn linear_slope(points: &[SeriesPoint]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_y: f64 = points.iter().map(|p| p.value).sum();
    let sum_xy: f64 = points.iter().enumerate().map(|(i, p)| i as f64 * p.value).sum();
    let sum_x2: f64 = (0..n).map(|i| (i as f64) * (i as f64)).sum();

    let denom = n_f * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }

    let slope = (n_f * sum_xy - sum_x * sum_y) / denom;
    if slope.is_finite() { slope } else { 0.0 }
}

/// Classify a slope into a direction
pub fn classify_direction(slope: f64) -> TrendDirection {
    if slope > TREND_STABLE_BAND {
        TrendDirection::Growing
    } else if slope < -TREND_STABLE_BAND {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Coefficient of variation as a percentage
pub fn variability(points: &[SeriesPoint]) -> f64 {
    let n = points.len();
    if n == 0 {
        return 0.0;
    }
    let mean = points.iter().map(|p| p.value).sum::<f64>() / n as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance =
        points.iter().map(|p| (p.value - mean).powi(2)).sum::<f64>() / n as f64;
    let cv = variance.sqrt() / mean * 100.0;
    if cv.is_finite() { cv } else { 0.0 }
}

/// Stability score from 0 (chaotic) to 100 (flat)
pub fn stability(variability_pct: f64) -> f64 {
    if variability_pct == 0.0 {
        100.0
    } else if variability_pct > STABILITY_VARIABILITY_CUTOFF {
        0.0
    } else {
        100.0 - 2.0 * variability_pct
    }
}

/// Flag points whose z-score strays beyond the threshold
///
/// Series shorter than the minimum report nothing. With a window, each point
/// from index `window - 1` on is scored against the trailing `window` points
/// ending at it; without one, every point is scored against the whole series.
/// The window is clamped up to the minimum point count.
pub fn detect_anomalies(points: &[SeriesPoint], window: Option<usize>) -> Vec<Anomaly> {
    if points.len() < ANOMALY_MIN_POINTS {
        return Vec::new();
    }

    match window {
        None => score_against(points, 0, points.len()),
        Some(w) => {
            let w = w.max(ANOMALY_MIN_POINTS).min(points.len());
            let mut anomalies = Vec::new();
            for end in w..=points.len() {
                let start = end - w;
                // Only the newest point of each window is scored, so every
                // point is evaluated exactly once
                anomalies.extend(score_against(points, start, end).into_iter().filter(
                    |a| a.index == end - 1 || (end == w && a.index < w),
                ));
            }
            anomalies.sort_by_key(|a| a.index);
            anomalies.dedup_by_key(|a| a.index);
            anomalies
        }
    }
}

/// Score points `[start, end)` against that same slice's mean and stddev
fn score_against(points: &[SeriesPoint], start: usize, end: usize) -> Vec<Anomaly> {
    let slice = &points[start..end];
    let n = slice.len() as f64;
    let mean = slice.iter().map(|p| p.value).sum::<f64>() / n;
    let variance = slice.iter().map(|p| (p.value - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return Vec::new();
    }

    slice
        .iter()
        .enumerate()
        .filter_map(|(offset, point)| {
            let z = (point.value - mean) / stddev;
            if z.abs() <= ANOMALY_Z_THRESHOLD {
                return None;
            }
            Some(Anomaly {
                index: start + offset,
                date: point.date,
                value: point.value,
                mean,
                z_score: z,
                kind: if z > 0.0 {
                    AnomalyKind::Spike
                } else {
                    AnomalyKind::Drop
                },
                severity: if z.abs() > ANOMALY_Z_SEVERE {
                    AnomalySeverity::High
                } else {
                    AnomalySeverity::Medium
                },
            })
        })
        .collect()
}

/// Weekday and monthly seasonal profiles
///
/// Undated points are skipped; only buckets with at least one sample appear.
pub fn seasonality(points: &[SeriesPoint]) -> Seasonality {
    let mut weekdays = [(0.0_f64, 0_usize); 7];
    let mut months = [(0.0_f64, 0_usize); 12];

    for point in points {
        let Some(date) = point.date else { continue };
        let wd = date.weekday().num_days_from_sunday() as usize;
        weekdays[wd].0 += point.value;
        weekdays[wd].1 += 1;
        let m = date.month0() as usize;
        months[m].0 += point.value;
        months[m].1 += 1;
    }

    let buckets = |totals: &[(f64, usize)], labels: &[&'static str]| {
        totals
            .iter()
            .zip(labels)
            .filter(|((_, samples), _)| *samples > 0)
            .map(|(&(total, samples), &label)| SeasonalBucket {
                label,
                mean: total / samples as f64,
                total,
                samples,
            })
            .collect()
    };

    Seasonality {
        by_weekday: buckets(&weekdays, &WEEKDAY_LABELS),
        by_month: buckets(&months, &MONTH_LABELS),
    }
}

/// Project the next day, week and month from the latest value
///
/// Series shorter than the minimum report `None`. Projections compound the
/// daily slope and never go negative.
pub fn project(points: &[SeriesPoint], slope: f64) -> Option<Projection> {
    if points.len() < PROJECTION_MIN_POINTS {
        return None;
    }
    let last = points.last()?.value;

    let horizon = |days: f64| (last * (1.0 + slope * days)).round().max(0.0);
    Some(Projection {
        next_day: horizon(1.0),
        next_week: horizon(7.0),
        next_month: horizon(30.0),
        confidence: confidence(points.len(), variability(points)),
    })
}

/// Projection confidence from series variability
///
/// Fewer than three points floor at 0.3; past that, noisier series earn
/// less confidence.
pub fn confidence(len: usize, variability_pct: f64) -> f64 {
    if len < 3 {
        0.3
    } else if variability_pct < 10.0 {
        0.9
    } else if variability_pct < 20.0 {
        0.8
    } else if variability_pct < 30.0 {
        0.7
    } else if variability_pct < 50.0 {
        0.6
    } else {
        0.5
    }
}

/// Run the full analysis over a series
pub fn analyze(points: &[SeriesPoint], options: AnalyzerOptions) -> TrendResult {
    let slope = linear_slope(points);
    let direction = classify_direction(slope);
    let variability_pct = variability(points);
    let stability = stability(variability_pct);
    let anomalies = detect_anomalies(points, options.anomaly_window);
    let seasonality = seasonality(points);
    let projection = project(points, slope);
    let recommendations =
        recommendations(direction, stability, &anomalies);

    TrendResult {
        direction,
        slope,
        variability_pct,
        stability,
        anomalies,
        seasonality,
        projection,
        recommendations,
    }
}

fn recommendations(
    direction: TrendDirection,
    stability: f64,
    anomalies: &[Anomaly],
) -> Vec<String> {
    let mut out = Vec::new();
    match direction {
        TrendDirection::Growing => {
            out.push("Volume is trending up; review processing capacity".to_string());
        }
        TrendDirection::Declining => {
            out.push("Volume is trending down; check for ingestion gaps".to_string());
        }
        TrendDirection::Stable => {}
    }
    if stability < 50.0 {
        out.push("High day-to-day variability; averages may be unreliable".to_string());
    }
    let severe = anomalies
        .iter()
        .filter(|a| a.severity == AnomalySeverity::High)
        .count();
    if severe > 0 {
        out.push(format!(
            "{severe} severe anomalies detected; inspect the flagged dates"
        ));
    }
    out
}

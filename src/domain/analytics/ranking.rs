//! Garage ranking and performance classification

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::constants::{
    DEFAULT_RANKING_TOP_N, TIER_EXCELLENT_MIN, TIER_GOOD_MIN, TIER_REGULAR_MIN,
};
use crate::data::types::MetricSnapshot;

/// Raw metrics for one rankable entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetrics {
    pub key: i64,
    pub name: Option<String>,
    pub count: i64,
    pub total_value: f64,
}

/// How entities with equal fine counts are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Higher total value ranks first
    #[default]
    TotalValue,
    /// Lower key ranks first
    KeyAscending,
}

/// Tuning knobs for [`rank`]
#[derive(Debug, Clone, Copy)]
pub struct RankingOptions {
    pub top_n: usize,
    pub tie_break: TieBreak,
    /// Days the metrics cover, used for the per-day rate
    pub period_days: i64,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_RANKING_TOP_N,
            tie_break: TieBreak::default(),
            period_days: 30,
        }
    }
}

/// Volume-based performance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Regular,
    Low,
}

impl PerformanceTier {
    /// Tier for a fine count over the ranking period
    pub fn for_count(count: i64) -> Self {
        if count >= TIER_EXCELLENT_MIN {
            Self::Excellent
        } else if count >= TIER_GOOD_MIN {
            Self::Good
        } else if count >= TIER_REGULAR_MIN {
            Self::Regular
        } else {
            Self::Low
        }
    }
}

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    /// 1-based position
    pub position: usize,
    pub key: i64,
    pub name: Option<String>,
    pub count: i64,
    pub total_value: f64,
    pub average_value: f64,
    pub per_day: f64,
    pub classification: PerformanceTier,
}

/// Build the leaderboard
///
/// Entities with non-finite or negative counts are dropped. Ordering is fine
/// count descending, then the configured tie-break, then key ascending so
/// the result is deterministic. The full set is sorted before truncating to
/// `top_n`, keeping positions stable across different `top_n` values.
pub fn rank(entities: &[EntityMetrics], options: &RankingOptions) -> Vec<RankingEntry> {
    let mut ranked: Vec<&EntityMetrics> = entities
        .iter()
        .filter(|e| e.count >= 0 && e.total_value.is_finite() && e.total_value >= 0.0)
        .collect();

    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| match options.tie_break {
                TieBreak::TotalValue => b
                    .total_value
                    .partial_cmp(&a.total_value)
                    .unwrap_or(Ordering::Equal),
                TieBreak::KeyAscending => a.key.cmp(&b.key),
            })
            .then_with(|| a.key.cmp(&b.key))
    });

    ranked
        .into_iter()
        .take(options.top_n)
        .enumerate()
        .map(|(index, entity)| RankingEntry {
            position: index + 1,
            key: entity.key,
            name: entity.name.clone(),
            count: entity.count,
            total_value: entity.total_value,
            average_value: if entity.count > 0 {
                entity.total_value / entity.count as f64
            } else {
                0.0
            },
            per_day: if options.period_days > 0 {
                entity.count as f64 / options.period_days as f64
            } else {
                0.0
            },
            classification: PerformanceTier::for_count(entity.count),
        })
        .collect()
}

/// Collapse per-garage snapshots into one metrics row per garage
///
/// Fleet-wide rows (no garage code) are skipped; they aggregate the same
/// fines the garage rows already carry.
pub fn entity_metrics_from_snapshots(snapshots: &[MetricSnapshot]) -> Vec<EntityMetrics> {
    let mut grouped: BTreeMap<i64, EntityMetrics> = BTreeMap::new();
    for snapshot in snapshots {
        let Some(code) = snapshot.garage_code else {
            continue;
        };
        let entry = grouped.entry(code).or_insert_with(|| EntityMetrics {
            key: code,
            name: None,
            count: 0,
            total_value: 0.0,
        });
        entry.count += snapshot.total_fines;
        entry.total_value += snapshot.total_value;
        if entry.name.is_none() {
            entry.name = snapshot.garage_name.clone();
        }
    }
    grouped.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entity(key: i64, count: i64, total_value: f64) -> EntityMetrics {
        EntityMetrics {
            key,
            name: None,
            count,
            total_value,
        }
    }

    #[test]
    fn test_rank_orders_by_count_descending() {
        let entities = vec![entity(1, 30, 300.0), entity(2, 120, 900.0), entity(3, 55, 400.0)];
        let ranked = rank(&entities, &RankingOptions::default());

        let keys: Vec<i64> = ranked.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![2, 3, 1]);
        assert_eq!(ranked[0].position, 1);
        assert_eq!(ranked[2].position, 3);
    }

    #[test]
    fn test_tie_break_by_total_value_then_key() {
        let entities = vec![entity(5, 50, 100.0), entity(3, 50, 300.0), entity(4, 50, 300.0)];
        let ranked = rank(&entities, &RankingOptions::default());
        let keys: Vec<i64> = ranked.iter().map(|e| e.key).collect();
        // Equal counts: higher value first, equal values fall back to key
        assert_eq!(keys, vec![3, 4, 5]);
    }

    #[test]
    fn test_tie_break_by_key_ascending() {
        let entities = vec![entity(9, 50, 900.0), entity(2, 50, 100.0)];
        let options = RankingOptions {
            tie_break: TieBreak::KeyAscending,
            ..Default::default()
        };
        let ranked = rank(&entities, &options);
        let keys: Vec<i64> = ranked.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![2, 9]);
    }

    #[test]
    fn test_top_n_truncates_after_full_sort() {
        let entities: Vec<EntityMetrics> =
            (1..=20).map(|i| entity(i, i * 10, i as f64)).collect();
        let options = RankingOptions {
            top_n: 3,
            ..Default::default()
        };
        let ranked = rank(&entities, &options);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].key, 20);
        assert_eq!(ranked[0].position, 1);
    }

    #[test]
    fn test_invalid_entities_dropped() {
        let entities = vec![
            entity(1, -5, 100.0),
            entity(2, 10, f64::NAN),
            entity(3, 10, 100.0),
        ];
        let ranked = rank(&entities, &RankingOptions::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].key, 3);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(PerformanceTier::for_count(150), PerformanceTier::Excellent);
        assert_eq!(PerformanceTier::for_count(100), PerformanceTier::Excellent);
        assert_eq!(PerformanceTier::for_count(99), PerformanceTier::Good);
        assert_eq!(PerformanceTier::for_count(50), PerformanceTier::Good);
        assert_eq!(PerformanceTier::for_count(20), PerformanceTier::Regular);
        assert_eq!(PerformanceTier::for_count(19), PerformanceTier::Low);
        assert_eq!(PerformanceTier::for_count(0), PerformanceTier::Low);
    }

    #[test]
    fn test_derived_fields() {
        let entities = vec![entity(1, 60, 1500.0)];
        let options = RankingOptions {
            period_days: 30,
            ..Default::default()
        };
        let ranked = rank(&entities, &options);
        assert!((ranked[0].average_value - 25.0).abs() < 1e-9);
        assert!((ranked[0].per_day - 2.0).abs() < 1e-9);
        assert_eq!(ranked[0].classification, PerformanceTier::Good);
    }

    #[test]
    fn test_entity_metrics_skip_fleet_rows() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut fleet = MetricSnapshot::empty(date, None);
        fleet.total_fines = 100;
        let mut g7a = MetricSnapshot::empty(date, Some(7));
        g7a.total_fines = 60;
        g7a.total_value = 600.0;
        g7a.garage_name = Some("North".into());
        let mut g7b = MetricSnapshot::empty(date.succ_opt().unwrap(), Some(7));
        g7b.total_fines = 40;
        g7b.total_value = 400.0;

        let metrics = entity_metrics_from_snapshots(&[fleet, g7a, g7b]);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].key, 7);
        assert_eq!(metrics[0].count, 100);
        assert_eq!(metrics[0].total_value, 1000.0);
        assert_eq!(metrics[0].name.as_deref(), Some("North"));
    }
}

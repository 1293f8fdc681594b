//! Daily metric snapshot and its categorical dimensions

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::error::DataError;

/// Payment status of a fine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Overdue,
    Pending,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] = [Self::Paid, Self::Overdue, Self::Pending];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Pending => "pending",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity tier of a fine, lightest to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Light,
    Medium,
    Severe,
    VerySevere,
}

impl SeverityTier {
    pub const ALL: [SeverityTier; 4] = [Self::Light, Self::Medium, Self::Severe, Self::VerySevere];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Severe => "severe",
            Self::VerySevere => "very_severe",
        }
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Channel through which a fine was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueChannel {
    Electronic,
    InPerson,
}

impl IssueChannel {
    pub const ALL: [IssueChannel; 2] = [Self::Electronic, Self::InPerson];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Electronic => "electronic",
            Self::InPerson => "in_person",
        }
    }
}

impl std::fmt::Display for IssueChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One day of aggregated fine metrics, optionally scoped to a garage
///
/// A row with `garage_code: None` is the fleet-wide aggregate for that date.
/// Counts are stored pre-bucketed by payment status, severity tier and issue
/// channel so queries never have to touch the raw fine records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub reference_date: NaiveDate,
    pub garage_code: Option<i64>,
    pub garage_name: Option<String>,

    pub total_fines: i64,
    pub total_value: f64,

    pub paid: i64,
    pub overdue: i64,
    pub pending: i64,

    pub light: i64,
    pub medium: i64,
    pub severe: i64,
    pub very_severe: i64,

    pub electronic: i64,
    pub in_person: i64,

    pub average_value: f64,
    /// Percentage of fines paid, 0 to 100
    pub payment_rate: f64,
}

impl MetricSnapshot {
    /// Zeroed snapshot for the given date and garage scope
    pub fn empty(reference_date: NaiveDate, garage_code: Option<i64>) -> Self {
        Self {
            reference_date,
            garage_code,
            garage_name: None,
            total_fines: 0,
            total_value: 0.0,
            paid: 0,
            overdue: 0,
            pending: 0,
            light: 0,
            medium: 0,
            severe: 0,
            very_severe: 0,
            electronic: 0,
            in_person: 0,
            average_value: 0.0,
            payment_rate: 0.0,
        }
    }

    /// Hard validation: negative counts or values and an out-of-range
    /// payment rate make the snapshot unstorable
    pub fn validate(&self) -> Result<(), DataError> {
        let counts = [
            ("total_fines", self.total_fines),
            ("paid", self.paid),
            ("overdue", self.overdue),
            ("pending", self.pending),
            ("light", self.light),
            ("medium", self.medium),
            ("severe", self.severe),
            ("very_severe", self.very_severe),
            ("electronic", self.electronic),
            ("in_person", self.in_person),
        ];
        for (name, value) in counts {
            if value < 0 {
                return Err(DataError::InvalidSnapshot(format!(
                    "{name} cannot be negative (got {value})"
                )));
            }
        }
        if self.total_value < 0.0 || self.average_value < 0.0 {
            return Err(DataError::InvalidSnapshot(
                "monetary values cannot be negative".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.payment_rate) {
            return Err(DataError::InvalidSnapshot(format!(
                "payment_rate must be between 0 and 100 (got {})",
                self.payment_rate
            )));
        }
        Ok(())
    }

    /// Soft consistency check: bucket sums that disagree with the total are
    /// logged but never rejected, since partial imports legitimately produce
    /// them. Sums of zero are skipped (the buckets were simply not populated).
    pub fn check_consistency(&self) {
        let status_sum = self.paid + self.overdue + self.pending;
        if status_sum > 0 && status_sum != self.total_fines {
            warn!(
                date = %self.reference_date,
                garage = ?self.garage_code,
                status_sum,
                total = self.total_fines,
                "status counts do not sum to total_fines"
            );
        }
        let severity_sum = self.light + self.medium + self.severe + self.very_severe;
        if severity_sum > 0 && severity_sum != self.total_fines {
            warn!(
                date = %self.reference_date,
                garage = ?self.garage_code,
                severity_sum,
                total = self.total_fines,
                "severity counts do not sum to total_fines"
            );
        }
        let channel_sum = self.electronic + self.in_person;
        if channel_sum > 0 && channel_sum != self.total_fines {
            warn!(
                date = %self.reference_date,
                garage = ?self.garage_code,
                channel_sum,
                total = self.total_fines,
                "channel counts do not sum to total_fines"
            );
        }
    }

    /// Count for one payment status bucket
    pub fn status_count(&self, status: PaymentStatus) -> i64 {
        match status {
            PaymentStatus::Paid => self.paid,
            PaymentStatus::Overdue => self.overdue,
            PaymentStatus::Pending => self.pending,
        }
    }

    /// Count for one severity bucket
    pub fn severity_count(&self, tier: SeverityTier) -> i64 {
        match tier {
            SeverityTier::Light => self.light,
            SeverityTier::Medium => self.medium,
            SeverityTier::Severe => self.severe,
            SeverityTier::VerySevere => self.very_severe,
        }
    }

    /// Count for one issue channel bucket
    pub fn channel_count(&self, channel: IssueChannel) -> i64 {
        match channel {
            IssueChannel::Electronic => self.electronic,
            IssueChannel::InPerson => self.in_person,
        }
    }

    /// Calendar month key, e.g. `2024-03`
    pub fn month_key(&self) -> String {
        self.reference_date.format("%Y-%m").to_string()
    }

    /// ISO week key, e.g. `2024-W11`
    pub fn week_key(&self) -> String {
        let iso = self.reference_date.iso_week();
        format!("{}-W{:02}", iso.year(), iso.week())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(date: NaiveDate) -> MetricSnapshot {
        let mut s = MetricSnapshot::empty(date, None);
        s.total_fines = 10;
        s.total_value = 1500.0;
        s.paid = 6;
        s.overdue = 1;
        s.pending = 3;
        s.average_value = 150.0;
        s.payment_rate = 60.0;
        s
    }

    #[test]
    fn test_valid_snapshot_passes() {
        let s = snapshot(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_negative_count_rejected() {
        let mut s = snapshot(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        s.overdue = -1;
        let err = s.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("overdue"));
    }

    #[test]
    fn test_payment_rate_out_of_range_rejected() {
        let mut s = snapshot(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        s.payment_rate = 120.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_inconsistent_buckets_still_valid() {
        let mut s = snapshot(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        s.paid = 2;
        s.check_consistency();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_month_and_week_keys() {
        let s = snapshot(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(s.month_key(), "2024-01");
        // 2024-01-01 falls in ISO week 2024-W01
        assert_eq!(s.week_key(), "2024-W01");

        let s = snapshot(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        // 2023-01-01 is a Sunday, ISO week 52 of 2022
        assert_eq!(s.week_key(), "2022-W52");
    }

    #[test]
    fn test_bucket_accessors() {
        let s = snapshot(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(s.status_count(PaymentStatus::Paid), 6);
        assert_eq!(s.status_count(PaymentStatus::Pending), 3);
        assert_eq!(s.severity_count(SeverityTier::Light), 0);
        assert_eq!(s.channel_count(IssueChannel::Electronic), 0);
    }
}

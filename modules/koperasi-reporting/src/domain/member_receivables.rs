//! Member receivables (piutang anggota) and collectibility classification
//!
//! Collectibility bands by days overdue:
//! - lancar (current): up to 90 days
//! - kurang lancar (substandard): 91-180 days
//! - diragukan (doubtful): 181-270 days
//! - macet (loss): over 270 days
//!
//! Required provisions are 0.5%, 10%, 50% and 100% of the outstanding balance.

use serde::{Deserialize, Serialize};

use super::validation::{
    check_duplicates, check_non_negative, check_not_blank, Thresholds, ValidationReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "collectibility", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Collectibility {
    Current,
    Substandard,
    Doubtful,
    Loss,
}

impl Collectibility {
    pub const ALL: [Collectibility; 4] = [
        Collectibility::Current,
        Collectibility::Substandard,
        Collectibility::Doubtful,
        Collectibility::Loss,
    ];

    pub fn from_days_overdue(days: i32) -> Self {
        match days {
            d if d <= 90 => Collectibility::Current,
            91..=180 => Collectibility::Substandard,
            181..=270 => Collectibility::Doubtful,
            _ => Collectibility::Loss,
        }
    }

    /// Required provision as a fraction of the outstanding balance
    pub fn provision_rate(&self) -> f64 {
        match self {
            Collectibility::Current => 0.005,
            Collectibility::Substandard => 0.10,
            Collectibility::Doubtful => 0.50,
            Collectibility::Loss => 1.0,
        }
    }

    pub fn is_non_performing(&self) -> bool {
        !matches!(self, Collectibility::Current)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Collectibility::Current => "current",
            Collectibility::Substandard => "substandard",
            Collectibility::Doubtful => "doubtful",
            Collectibility::Loss => "loss",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Collectibility::Current => "Lancar",
            Collectibility::Substandard => "Kurang Lancar",
            Collectibility::Doubtful => "Diragukan",
            Collectibility::Loss => "Macet",
        }
    }
}

/// Required provision for an outstanding balance, rounded to the nearest rupiah
pub fn required_provision(outstanding: i64, collectibility: Collectibility) -> i64 {
    (outstanding as f64 * collectibility.provision_rate()).round() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberReceivableLine {
    pub member_number: String,
    pub member_name: String,
    pub loan_amount: i64,
    pub outstanding_balance: i64,
    #[serde(default)]
    pub days_overdue: i32,
    pub collectibility: Collectibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemberReceivablesReport {
    pub lines: Vec<MemberReceivableLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectibilityBucket {
    pub collectibility: Collectibility,
    pub count: i64,
    pub outstanding: i64,
    pub required_provision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReceivablesSummary {
    pub total_loan_amount: i64,
    pub total_outstanding: i64,
    pub non_performing_outstanding: i64,
    pub required_provision: i64,
    pub buckets: Vec<CollectibilityBucket>,
}

impl MemberReceivablesReport {
    /// Breakdown by collectibility, always listing all four classes in order
    pub fn summary(&self) -> ReceivablesSummary {
        let mut buckets: Vec<CollectibilityBucket> = Collectibility::ALL
            .iter()
            .map(|c| CollectibilityBucket {
                collectibility: *c,
                count: 0,
                outstanding: 0,
                required_provision: 0,
            })
            .collect();

        let mut summary = ReceivablesSummary::default();
        for line in &self.lines {
            summary.total_loan_amount += line.loan_amount;
            summary.total_outstanding += line.outstanding_balance;
            if line.collectibility.is_non_performing() {
                summary.non_performing_outstanding += line.outstanding_balance;
            }

            let provision = required_provision(line.outstanding_balance, line.collectibility);
            summary.required_provision += provision;

            if let Some(bucket) = buckets
                .iter_mut()
                .find(|b| b.collectibility == line.collectibility)
            {
                bucket.count += 1;
                bucket.outstanding += line.outstanding_balance;
                bucket.required_provision += provision;
            }
        }
        summary.buckets = buckets;
        summary
    }

    pub fn validate(&self, _thresholds: &Thresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        for (idx, line) in self.lines.iter().enumerate() {
            check_not_blank(
                &mut report,
                format!("lines[{}].member_number", idx),
                "Member number",
                &line.member_number,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].loan_amount", idx),
                "Loan amount",
                line.loan_amount,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].outstanding_balance", idx),
                "Outstanding balance",
                line.outstanding_balance,
            );
            if line.days_overdue < 0 {
                report.error(
                    "NEGATIVE_DAYS_OVERDUE",
                    format!("Days overdue cannot be negative, got {}", line.days_overdue),
                    Some(format!("lines[{}].days_overdue", idx)),
                );
            }
            if line.outstanding_balance > line.loan_amount {
                report.error(
                    "OUTSTANDING_EXCEEDS_LOAN",
                    format!(
                        "Member {}: outstanding balance ({}) exceeds the loan amount ({})",
                        line.member_number, line.outstanding_balance, line.loan_amount
                    ),
                    Some(format!("lines[{}].outstanding_balance", idx)),
                );
            }
            check_classification(&mut report, idx, &line.member_number, line.days_overdue, line.collectibility);
        }

        check_duplicates(
            &mut report,
            "DUPLICATE_MEMBER",
            "member number",
            self.lines.iter().map(|l| l.member_number.as_str()),
        );

        report
    }
}

/// Warn when the stated class disagrees with the class implied by days overdue
pub(crate) fn check_classification(
    report: &mut ValidationReport,
    idx: usize,
    member_number: &str,
    days_overdue: i32,
    stated: Collectibility,
) {
    let implied = Collectibility::from_days_overdue(days_overdue);
    if implied != stated {
        report.warning(
            "COLLECTIBILITY_MISMATCH",
            format!(
                "Member {} is {} days overdue, which implies '{}', but is classified '{}'",
                member_number,
                days_overdue,
                implied.label(),
                stated.label()
            ),
            Some(format!("lines[{}].collectibility", idx)),
        );
    }
}

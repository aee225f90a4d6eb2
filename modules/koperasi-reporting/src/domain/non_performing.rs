//! Non-performing receivables (piutang bermasalah) and provision adequacy

use serde::{Deserialize, Serialize};

use super::member_receivables::{check_classification, required_provision, Collectibility};
use super::validation::{
    check_duplicates, check_non_negative, check_not_blank, Thresholds, ValidationReport,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NonPerformingLine {
    pub member_number: String,
    pub member_name: String,
    pub outstanding_balance: i64,
    pub days_overdue: i32,
    pub collectibility: Collectibility,
    #[serde(default)]
    pub collateral_value: i64,
    pub provision_amount: i64,
}

impl NonPerformingLine {
    pub fn required_provision(&self) -> i64 {
        required_provision(self.outstanding_balance, self.collectibility)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NonPerformingReport {
    pub lines: Vec<NonPerformingLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NonPerformingTotals {
    pub outstanding: i64,
    pub collateral: i64,
    pub provision: i64,
    pub required_provision: i64,
}

impl NonPerformingReport {
    pub fn totals(&self) -> NonPerformingTotals {
        self.lines
            .iter()
            .fold(NonPerformingTotals::default(), |mut t, l| {
                t.outstanding += l.outstanding_balance;
                t.collateral += l.collateral_value;
                t.provision += l.provision_amount;
                t.required_provision += l.required_provision();
                t
            })
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
                format!("lines[{}].outstanding_balance", idx),
                "Outstanding balance",
                line.outstanding_balance,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].provision_amount", idx),
                "Provision amount",
                line.provision_amount,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].collateral_value", idx),
                "Collateral value",
                line.collateral_value,
            );

            if !line.collectibility.is_non_performing() {
                report.error(
                    "PERFORMING_IN_NPL_REPORT",
                    format!(
                        "Member {} is classified '{}' and does not belong in the non-performing list",
                        line.member_number,
                        line.collectibility.label()
                    ),
                    Some(format!("lines[{}].collectibility", idx)),
                );
            }

            let required = line.required_provision();
            if line.provision_amount < required {
                report.error(
                    "UNDER_PROVISIONED",
                    format!(
                        "Member {}: provision {} is below the required {} ({}% of {})",
                        line.member_number,
                        line.provision_amount,
                        required,
                        line.collectibility.provision_rate() * 100.0,
                        line.outstanding_balance
                    ),
                    Some(format!("lines[{}].provision_amount", idx)),
                );
            }
            if line.provision_amount > line.outstanding_balance {
                report.error(
                    "PROVISION_EXCEEDS_OUTSTANDING",
                    format!(
                        "Member {}: provision {} exceeds the outstanding balance {}",
                        line.member_number, line.provision_amount, line.outstanding_balance
                    ),
                    Some(format!("lines[{}].provision_amount", idx)),
                );
            }
            if line.collateral_value > line.outstanding_balance {
                report.info(
                    "OVER_COLLATERALIZED",
                    format!(
                        "Member {}: collateral {} covers the outstanding balance {}",
                        line.member_number, line.collateral_value, line.outstanding_balance
                    ),
                    Some(format!("lines[{}].collateral_value", idx)),
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

/// Share of receivables that are non-performing, None when there are no receivables
pub fn npl_ratio(non_performing_outstanding: i64, total_outstanding: i64) -> Option<f64> {
    if total_outstanding <= 0 {
        return None;
    }
    Some(non_performing_outstanding as f64 / total_outstanding as f64)
}

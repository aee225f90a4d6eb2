//! Cash flow statement (laporan arus kas)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::validation::{check_not_blank, Thresholds, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cash_flow_activity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CashFlowActivity {
    Operating,
    Investing,
    Financing,
}

/// Signed cash movement: inflows positive, outflows negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CashFlowLine {
    pub activity: CashFlowActivity,
    pub description: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CashFlowStatement {
    pub beginning_cash: i64,
    pub ending_cash: i64,
    pub lines: Vec<CashFlowLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CashFlowTotals {
    pub operating: i64,
    pub investing: i64,
    pub financing: i64,
    pub net_change: i64,
    /// beginning_cash + net_change
    pub computed_ending_cash: i64,
}

impl CashFlowStatement {
    pub fn totals(&self) -> CashFlowTotals {
        let mut t = CashFlowTotals::default();
        for line in &self.lines {
            match line.activity {
                CashFlowActivity::Operating => t.operating += line.amount,
                CashFlowActivity::Investing => t.investing += line.amount,
                CashFlowActivity::Financing => t.financing += line.amount,
            }
        }
        t.net_change = t.operating + t.investing + t.financing;
        t.computed_ending_cash = self.beginning_cash + t.net_change;
        t
    }

    pub fn validate(&self, thresholds: &Thresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.lines.is_empty() {
            report.warning("NO_ACTIVITY", "Cash flow statement has no activity lines", None);
        }

        let mut seen = HashSet::new();
        for (idx, line) in self.lines.iter().enumerate() {
            check_not_blank(
                &mut report,
                format!("lines[{}].description", idx),
                "Description",
                &line.description,
            );
            if line.amount == 0 {
                report.warning(
                    "ZERO_AMOUNT",
                    format!("'{}' has a zero amount", line.description),
                    Some(format!("lines[{}].amount", idx)),
                );
            }
            if !seen.insert((line.activity, line.description.trim().to_lowercase())) {
                report.warning(
                    "DUPLICATE_DESCRIPTION",
                    format!("'{}' appears more than once in the same activity", line.description),
                    Some(format!("lines[{}]", idx)),
                );
            }
        }

        if self.beginning_cash < 0 {
            report.error(
                "NEGATIVE_CASH",
                format!("Beginning cash cannot be negative, got {}", self.beginning_cash),
                Some("beginning_cash".to_string()),
            );
        }
        if self.ending_cash < 0 {
            report.error(
                "NEGATIVE_CASH",
                format!("Ending cash cannot be negative, got {}", self.ending_cash),
                Some("ending_cash".to_string()),
            );
        }

        let totals = self.totals();
        let difference = totals.computed_ending_cash - self.ending_cash;
        if difference.abs() > thresholds.balance_tolerance {
            report.error(
                "CASH_RECONCILIATION_MISMATCH",
                format!(
                    "Beginning cash ({}) + net change ({}) = {}, but ending cash is {}",
                    self.beginning_cash, totals.net_change, totals.computed_ending_cash, self.ending_cash
                ),
                Some("ending_cash".to_string()),
            );
            report.with_metadata(serde_json::json!({ "difference": difference }));
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::validation::has_blocking_errors;

    pub(crate) fn statement() -> CashFlowStatement {
        CashFlowStatement {
            beginning_cash: 35_000,
            ending_cash: 40_000,
            lines: vec![
                CashFlowLine {
                    activity: CashFlowActivity::Operating,
                    description: "Receipts from members".to_string(),
                    amount: 25_000,
                },
                CashFlowLine {
                    activity: CashFlowActivity::Investing,
                    description: "Purchase of equipment".to_string(),
                    amount: -12_000,
                },
                CashFlowLine {
                    activity: CashFlowActivity::Financing,
                    description: "SHU paid to members".to_string(),
                    amount: -8_000,
                },
            ],
        }
    }

    #[test]
    fn test_totals() {
        let t = statement().totals();
        assert_eq!(t.operating, 25_000);
        assert_eq!(t.net_change, 5_000);
        assert_eq!(t.computed_ending_cash, 40_000);
    }

    #[test]
    fn test_reconciled_statement_passes() {
        let report = statement().validate(&Thresholds::default());
        assert!(report.issues.is_empty(), "{:?}", report);
    }

    #[test]
    fn test_ending_cash_mismatch() {
        let mut s = statement();
        s.ending_cash = 41_000;
        let report = s.validate(&Thresholds::default());
        assert!(report.has_code("CASH_RECONCILIATION_MISMATCH"));
        assert!(has_blocking_errors(&report));
    }

    #[test]
    fn test_duplicate_description_is_case_insensitive() {
        let mut s = statement();
        s.lines.push(CashFlowLine {
            activity: CashFlowActivity::Operating,
            description: "receipts from members ".to_string(),
            amount: 0,
        });
        let report = s.validate(&Thresholds::default());
        assert!(report.has_code("DUPLICATE_DESCRIPTION"));
        assert!(report.has_code("ZERO_AMOUNT"));
        assert!(!has_blocking_errors(&report));
    }
}

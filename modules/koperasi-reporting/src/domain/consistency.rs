//! Cross-report consistency checks for one cooperative and reporting year
//!
//! Each check compares a figure from one statement against the matching figure
//! in another. A check is skipped when one of the reports it needs is missing.

use serde::{Deserialize, Serialize};

use super::balance_sheet::BalanceSheet;
use super::cash_flow::CashFlowStatement;
use super::equity_changes::{EquityChangesStatement, EquityComponent};
use super::income_statement::IncomeStatement;
use super::member_receivables::MemberReceivablesReport;
use super::member_savings::MemberSavingsReport;
use super::non_performing::NonPerformingReport;
use super::report::Period;
use super::shu::ShuDistribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub code: String,
    pub description: String,
    pub expected: Option<i64>,
    pub actual: Option<i64>,
    /// actual - expected
    pub difference: Option<i64>,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencySummary {
    pub checks: Vec<ConsistencyCheck>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// True when nothing failed; skipped checks do not count against it
    pub is_consistent: bool,
}

/// The reports of one year, plus the prior-year balance sheet when available
#[derive(Debug, Clone, Default)]
pub struct ReportSet {
    pub balance_sheet: Option<BalanceSheet>,
    pub previous_balance_sheet: Option<BalanceSheet>,
    pub income_statement: Option<IncomeStatement>,
    pub cash_flow: Option<CashFlowStatement>,
    pub equity_changes: Option<EquityChangesStatement>,
    pub member_savings: Option<MemberSavingsReport>,
    pub member_receivables: Option<MemberReceivablesReport>,
    pub non_performing: Option<NonPerformingReport>,
    pub shu_distribution: Option<ShuDistribution>,
}

fn skipped(code: &str, description: &str) -> ConsistencyCheck {
    ConsistencyCheck {
        code: code.to_string(),
        description: description.to_string(),
        expected: None,
        actual: None,
        difference: None,
        status: CheckStatus::Skipped,
    }
}

/// Passes when |actual - expected| <= tolerance
fn equal(
    code: &str,
    description: &str,
    pair: Option<(i64, i64)>,
    tolerance: i64,
) -> ConsistencyCheck {
    let Some((expected, actual)) = pair else {
        return skipped(code, description);
    };
    let difference = actual - expected;
    ConsistencyCheck {
        code: code.to_string(),
        description: description.to_string(),
        expected: Some(expected),
        actual: Some(actual),
        difference: Some(difference),
        status: if difference.abs() <= tolerance {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        },
    }
}

/// Passes when actual does not exceed the expected ceiling
fn at_most(code: &str, description: &str, pair: Option<(i64, i64)>) -> ConsistencyCheck {
    let Some((ceiling, actual)) = pair else {
        return skipped(code, description);
    };
    ConsistencyCheck {
        code: code.to_string(),
        description: description.to_string(),
        expected: Some(ceiling),
        actual: Some(actual),
        difference: Some(actual - ceiling),
        status: if actual <= ceiling {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        },
    }
}

/// Beginning cash comes from the prior-year balance sheet, falling back to the
/// comparative column of this year's balance sheet.
fn opening_cash(set: &ReportSet) -> Option<i64> {
    if let Some(previous) = &set.previous_balance_sheet {
        return Some(previous.totals(Period::Current).cash);
    }
    set.balance_sheet
        .as_ref()
        .filter(|bs| bs.has_previous_year())
        .map(|bs| bs.totals(Period::Previous).cash)
}

pub fn check_consistency(set: &ReportSet, tolerance: i64) -> ConsistencySummary {
    let bs = set.balance_sheet.as_ref().map(|b| b.totals(Period::Current));
    let is = set
        .income_statement
        .as_ref()
        .map(|i| i.totals(Period::Current));
    let shu = set.shu_distribution.as_ref();
    let savings = set.member_savings.as_ref().map(|m| m.totals());
    let receivables = set.member_receivables.as_ref().map(|r| r.summary());
    let npl = set.non_performing.as_ref().map(|n| n.totals());

    let checks = vec![
        equal(
            "BALANCE_EQUATION",
            "Balance sheet: total assets = total liabilities + total equity",
            bs.map(|t| (t.total_liabilities + t.total_equity, t.total_assets)),
            tolerance,
        ),
        equal(
            "NET_SHU_MATCHES_DISTRIBUTION",
            "Income statement SHU after tax = SHU distribution after tax",
            is.zip(shu).map(|(i, s)| (i.shu_after_tax, s.shu_after_tax)),
            tolerance,
        ),
        equal(
            "SHU_BEFORE_TAX_MATCHES_DISTRIBUTION",
            "Income statement SHU before tax = SHU distribution before tax",
            is.zip(shu).map(|(i, s)| (i.shu_before_tax, s.shu_before_tax)),
            tolerance,
        ),
        equal(
            "ENDING_CASH_MATCHES_BALANCE_SHEET",
            "Cash flow ending cash = balance sheet cash",
            bs.zip(set.cash_flow.as_ref())
                .map(|(b, cf)| (b.cash, cf.ending_cash)),
            tolerance,
        ),
        equal(
            "BEGINNING_CASH_MATCHES_PRIOR_YEAR",
            "Cash flow beginning cash = prior-year balance sheet cash",
            opening_cash(set)
                .zip(set.cash_flow.as_ref())
                .map(|(cash, cf)| (cash, cf.beginning_cash)),
            tolerance,
        ),
        equal(
            "EQUITY_MATCHES_BALANCE_SHEET",
            "Equity changes ending total = balance sheet equity",
            bs.zip(set.equity_changes.as_ref())
                .map(|(b, ec)| (b.total_equity, ec.totals().ending_balance)),
            tolerance,
        ),
        equal(
            "UNDISTRIBUTED_SHU_MATCHES_NET_SHU",
            "Undistributed SHU additions = income statement SHU after tax",
            is.zip(set.equity_changes.as_ref()).map(|(i, ec)| {
                let additions = ec
                    .component(EquityComponent::UndistributedShu)
                    .map(|l| l.additions)
                    .unwrap_or(0);
                (i.shu_after_tax, additions)
            }),
            tolerance,
        ),
        equal(
            "PRINCIPAL_SAVINGS_MATCH",
            "Member principal savings total = balance sheet principal savings",
            bs.zip(savings)
                .map(|(b, s)| (b.principal_savings, s.principal_savings)),
            tolerance,
        ),
        equal(
            "MANDATORY_SAVINGS_MATCH",
            "Member mandatory savings total = balance sheet mandatory savings",
            bs.zip(savings)
                .map(|(b, s)| (b.mandatory_savings, s.mandatory_savings)),
            tolerance,
        ),
        equal(
            "VOLUNTARY_SAVINGS_MATCH",
            "Member voluntary savings total = balance sheet voluntary savings",
            bs.zip(savings)
                .map(|(b, s)| (b.voluntary_savings, s.voluntary_savings)),
            tolerance,
        ),
        equal(
            "RECEIVABLES_MATCH_BALANCE_SHEET",
            "Member receivables outstanding = balance sheet member receivables",
            bs.zip(receivables.as_ref())
                .map(|(b, r)| (b.member_receivables, r.total_outstanding)),
            tolerance,
        ),
        at_most(
            "NPL_WITHIN_RECEIVABLES",
            "Non-performing outstanding <= member receivables outstanding",
            receivables
                .as_ref()
                .zip(npl)
                .map(|(r, n)| (r.total_outstanding, n.outstanding)),
        ),
        equal(
            "PROVISIONS_MATCH_ALLOWANCE",
            "Non-performing provisions = balance sheet loan loss allowance",
            bs.zip(npl).map(|(b, n)| (b.loan_loss_allowance, n.provision)),
            tolerance,
        ),
    ];

    let count = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count();
    let passed = count(CheckStatus::Passed);
    let failed = count(CheckStatus::Failed);
    let skipped = count(CheckStatus::Skipped);

    ConsistencySummary {
        passed,
        failed,
        skipped,
        is_consistent: failed == 0,
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::balance_sheet::tests::balanced_sheet;
    use crate::domain::balance_sheet::LineRole;
    use crate::domain::{
        cash_flow, equity_changes, income_statement, member_receivables, member_savings,
        non_performing, shu,
    };

    fn check<'a>(summary: &'a ConsistencySummary, code: &str) -> &'a ConsistencyCheck {
        summary
            .checks
            .iter()
            .find(|c| c.code == code)
            .unwrap_or_else(|| panic!("missing check {}", code))
    }

    /// A full year where every statement agrees with every other
    fn consistent_set() -> ReportSet {
        let mut bs = balanced_sheet();
        for line in bs.lines.iter_mut() {
            if line.role == Some(LineRole::LoanLossAllowance) {
                line.current_amount = 23_000;
            }
            if line.account_code == "1-210" {
                line.current_amount = 83_000;
            }
        }
        let mut equity = equity_changes::tests::statement();
        for line in equity.lines.iter_mut() {
            if line.component == EquityComponent::UndistributedShu {
                line.additions = 126_000;
            }
        }

        ReportSet {
            balance_sheet: Some(bs),
            previous_balance_sheet: None,
            income_statement: Some(income_statement::tests::statement()),
            cash_flow: Some(cash_flow::tests::statement()),
            equity_changes: Some(equity),
            member_savings: Some(member_savings::tests::register()),
            member_receivables: Some(member_receivables::tests::register()),
            non_performing: Some(non_performing::tests::report()),
            shu_distribution: Some(shu::tests::distribution()),
        }
    }

    #[test]
    fn test_consistent_year() {
        let summary = check_consistency(&consistent_set(), 1);
        assert!(summary.is_consistent, "{:#?}", summary);
        assert_eq!(summary.checks.len(), 13);
        assert_eq!(summary.passed, 13);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn test_missing_reports_are_skipped() {
        let summary = check_consistency(&ReportSet::default(), 1);
        assert_eq!(summary.skipped, 13);
        assert!(summary.is_consistent);

        let set = ReportSet {
            balance_sheet: Some(balanced_sheet()),
            ..Default::default()
        };
        let summary = check_consistency(&set, 1);
        assert_eq!(check(&summary, "BALANCE_EQUATION").status, CheckStatus::Passed);
        assert_eq!(
            check(&summary, "NET_SHU_MATCHES_DISTRIBUTION").status,
            CheckStatus::Skipped
        );
    }

    #[test]
    fn test_provision_mismatch_reports_difference() {
        let mut set = consistent_set();
        set.balance_sheet = Some(balanced_sheet());
        let summary = check_consistency(&set, 1);
        let c = check(&summary, "PROVISIONS_MATCH_ALLOWANCE");
        assert_eq!(c.status, CheckStatus::Failed);
        assert_eq!(c.expected, Some(5_000));
        assert_eq!(c.actual, Some(23_000));
        assert_eq!(c.difference, Some(18_000));
        assert!(!summary.is_consistent);
    }

    #[test]
    fn test_tolerance() {
        let mut set = consistent_set();
        if let Some(cf) = set.cash_flow.as_mut() {
            cf.ending_cash += 1;
        }
        let summary = check_consistency(&set, 1);
        assert_eq!(
            check(&summary, "ENDING_CASH_MATCHES_BALANCE_SHEET").status,
            CheckStatus::Passed
        );
        let summary = check_consistency(&set, 0);
        assert_eq!(
            check(&summary, "ENDING_CASH_MATCHES_BALANCE_SHEET").status,
            CheckStatus::Failed
        );
    }

    #[test]
    fn test_prior_year_sheet_takes_precedence() {
        let mut set = consistent_set();
        let mut previous = balanced_sheet();
        for line in previous.lines.iter_mut() {
            if line.role == Some(LineRole::Cash) {
                line.current_amount = 30_000;
            }
        }
        set.previous_balance_sheet = Some(previous);
        let summary = check_consistency(&set, 1);
        let c = check(&summary, "BEGINNING_CASH_MATCHES_PRIOR_YEAR");
        assert_eq!(c.expected, Some(30_000));
        assert_eq!(c.status, CheckStatus::Failed);
    }

    #[test]
    fn test_npl_above_receivables_fails() {
        let mut set = consistent_set();
        set.member_receivables = Some(MemberReceivablesReport::default());
        let summary = check_consistency(&set, 1);
        assert_eq!(check(&summary, "NPL_WITHIN_RECEIVABLES").status, CheckStatus::Failed);
    }
}

//! Balance sheet (neraca) lines, totals, and the balance equation check

use serde::{Deserialize, Serialize};

use super::report::Period;
use super::validation::{
    check_duplicates, check_non_negative, check_not_blank, check_swing, Thresholds,
    ValidationReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "balance_sheet_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BalanceSheetCategory {
    CurrentAsset,
    NonCurrentAsset,
    CurrentLiability,
    NonCurrentLiability,
    Equity,
}

/// Semantic tag linking a balance sheet line to figures in other reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "balance_sheet_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LineRole {
    Cash,
    MemberReceivables,
    LoanLossAllowance,
    PrincipalSavings,
    MandatorySavings,
    VoluntarySavings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BalanceSheetLine {
    pub account_code: String,
    pub account_name: String,
    pub category: BalanceSheetCategory,
    #[serde(default)]
    pub role: Option<LineRole>,
    /// Contra accounts (allowances, accumulated depreciation) reduce their category
    #[serde(default)]
    pub is_contra: bool,
    pub current_amount: i64,
    #[serde(default)]
    pub previous_amount: i64,
}

impl BalanceSheetLine {
    pub fn amount(&self, period: Period) -> i64 {
        match period {
            Period::Current => self.current_amount,
            Period::Previous => self.previous_amount,
        }
    }

    /// Amount with contra lines negated
    pub fn signed_amount(&self, period: Period) -> i64 {
        if self.is_contra {
            -self.amount(period)
        } else {
            self.amount(period)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BalanceSheet {
    pub lines: Vec<BalanceSheetLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BalanceSheetTotals {
    pub current_assets: i64,
    pub non_current_assets: i64,
    pub total_assets: i64,
    pub current_liabilities: i64,
    pub non_current_liabilities: i64,
    pub total_liabilities: i64,
    pub total_equity: i64,
    pub cash: i64,
    pub member_receivables: i64,
    pub loan_loss_allowance: i64,
    pub principal_savings: i64,
    pub mandatory_savings: i64,
    pub voluntary_savings: i64,
}

impl BalanceSheetTotals {
    /// assets - (liabilities + equity)
    pub fn imbalance(&self) -> i64 {
        self.total_assets - (self.total_liabilities + self.total_equity)
    }
}

impl BalanceSheet {
    pub fn totals(&self, period: Period) -> BalanceSheetTotals {
        let mut t = BalanceSheetTotals::default();

        for line in &self.lines {
            let signed = line.signed_amount(period);
            match line.category {
                BalanceSheetCategory::CurrentAsset => t.current_assets += signed,
                BalanceSheetCategory::NonCurrentAsset => t.non_current_assets += signed,
                BalanceSheetCategory::CurrentLiability => t.current_liabilities += signed,
                BalanceSheetCategory::NonCurrentLiability => t.non_current_liabilities += signed,
                BalanceSheetCategory::Equity => t.total_equity += signed,
            }

            let raw = line.amount(period);
            match line.role {
                Some(LineRole::Cash) => t.cash += raw,
                Some(LineRole::MemberReceivables) => t.member_receivables += raw,
                Some(LineRole::LoanLossAllowance) => t.loan_loss_allowance += raw,
                Some(LineRole::PrincipalSavings) => t.principal_savings += raw,
                Some(LineRole::MandatorySavings) => t.mandatory_savings += raw,
                Some(LineRole::VoluntarySavings) => t.voluntary_savings += raw,
                None => {}
            }
        }

        t.total_assets = t.current_assets + t.non_current_assets;
        t.total_liabilities = t.current_liabilities + t.non_current_liabilities;
        t
    }

    /// First-year reports carry no comparative figures
    pub fn has_previous_year(&self) -> bool {
        self.lines.iter().any(|l| l.previous_amount != 0)
    }

    pub fn validate(&self, thresholds: &Thresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.lines.is_empty() {
            report.error("EMPTY_REPORT", "Balance sheet has no account lines", None);
            return report;
        }

        for (idx, line) in self.lines.iter().enumerate() {
            check_not_blank(
                &mut report,
                format!("lines[{}].account_code", idx),
                "Account code",
                &line.account_code,
            );
            check_not_blank(
                &mut report,
                format!("lines[{}].account_name", idx),
                "Account name",
                &line.account_name,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].current_amount", idx),
                &line.account_name,
                line.current_amount,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].previous_amount", idx),
                &line.account_name,
                line.previous_amount,
            );
        }

        check_duplicates(
            &mut report,
            "DUPLICATE_ACCOUNT",
            "account code",
            self.lines.iter().map(|l| l.account_code.as_str()),
        );

        if !self.lines.iter().any(|l| l.category == BalanceSheetCategory::Equity) {
            report.warning("NO_EQUITY_LINES", "Balance sheet has no equity accounts", None);
        }

        check_equation(&mut report, &self.totals(Period::Current), "current", thresholds);
        if self.has_previous_year() {
            check_equation(&mut report, &self.totals(Period::Previous), "previous", thresholds);
        }

        for (idx, line) in self.lines.iter().enumerate() {
            check_swing(
                &mut report,
                format!("lines[{}]", idx),
                &line.account_name,
                line.current_amount,
                line.previous_amount,
                thresholds.swing_warning_pct,
            );
        }

        report
    }
}

fn check_equation(
    report: &mut ValidationReport,
    totals: &BalanceSheetTotals,
    year: &str,
    thresholds: &Thresholds,
) {
    let imbalance = totals.imbalance();
    if imbalance.abs() > thresholds.balance_tolerance {
        report.error(
            "BALANCE_EQUATION_MISMATCH",
            format!(
                "Total assets ({}) must equal liabilities ({}) + equity ({}) for the {} year, difference {}",
                totals.total_assets, totals.total_liabilities, totals.total_equity, year, imbalance
            ),
            None,
        );
        report.with_metadata(serde_json::json!({
            "year": year,
            "total_assets": totals.total_assets,
            "total_liabilities": totals.total_liabilities,
            "total_equity": totals.total_equity,
            "difference": imbalance,
        }));
    }
}

//! Income statement (perhitungan hasil usaha) and SHU arithmetic

use serde::{Deserialize, Serialize};

use super::report::Period;
use super::validation::{
    check_duplicates, check_non_negative, check_not_blank, check_swing, Thresholds,
    ValidationReport,
};

/// Line category; the category decides the sign, so amounts are never negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "income_statement_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IncomeCategory {
    OperatingRevenue,
    CostOfRevenue,
    OperatingExpense,
    OtherIncome,
    OtherExpense,
    IncomeTax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IncomeStatementLine {
    pub account_code: String,
    pub account_name: String,
    pub category: IncomeCategory,
    pub current_amount: i64,
    #[serde(default)]
    pub previous_amount: i64,
}

impl IncomeStatementLine {
    pub fn amount(&self, period: Period) -> i64 {
        match period {
            Period::Current => self.current_amount,
            Period::Previous => self.previous_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IncomeStatement {
    pub lines: Vec<IncomeStatementLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IncomeStatementTotals {
    pub operating_revenue: i64,
    pub cost_of_revenue: i64,
    pub gross_profit: i64,
    pub operating_expense: i64,
    pub operating_shu: i64,
    pub other_income: i64,
    pub other_expense: i64,
    pub shu_before_tax: i64,
    pub income_tax: i64,
    /// Net SHU, the amount available for distribution
    pub shu_after_tax: i64,
}

impl IncomeStatementTotals {
    pub fn total_revenue(&self) -> i64 {
        self.operating_revenue + self.other_income
    }

    pub fn total_expense(&self) -> i64 {
        self.cost_of_revenue + self.operating_expense + self.other_expense
    }
}

impl IncomeStatement {
    pub fn totals(&self, period: Period) -> IncomeStatementTotals {
        let mut t = IncomeStatementTotals::default();
        for line in &self.lines {
            let amount = line.amount(period);
            match line.category {
                IncomeCategory::OperatingRevenue => t.operating_revenue += amount,
                IncomeCategory::CostOfRevenue => t.cost_of_revenue += amount,
                IncomeCategory::OperatingExpense => t.operating_expense += amount,
                IncomeCategory::OtherIncome => t.other_income += amount,
                IncomeCategory::OtherExpense => t.other_expense += amount,
                IncomeCategory::IncomeTax => t.income_tax += amount,
            }
        }
        t.gross_profit = t.operating_revenue - t.cost_of_revenue;
        t.operating_shu = t.gross_profit - t.operating_expense;
        t.shu_before_tax = t.operating_shu + t.other_income - t.other_expense;
        t.shu_after_tax = t.shu_before_tax - t.income_tax;
        t
    }

    pub fn validate(&self, thresholds: &Thresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.lines.is_empty() {
            report.error("EMPTY_REPORT", "Income statement has no account lines", None);
            return report;
        }

        for (idx, line) in self.lines.iter().enumerate() {
            check_not_blank(
                &mut report,
                format!("lines[{}].account_code", idx),
                "Account code",
                &line.account_code,
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

        if !self
            .lines
            .iter()
            .any(|l| l.category == IncomeCategory::OperatingRevenue)
        {
            report.error(
                "NO_REVENUE",
                "Income statement must contain at least one operating revenue line",
                None,
            );
        }

        let totals = self.totals(Period::Current);
        if totals.income_tax > 0 && totals.shu_before_tax <= 0 {
            report.warning(
                "TAX_ON_LOSS",
                format!(
                    "Income tax ({}) recorded although SHU before tax is {}",
                    totals.income_tax, totals.shu_before_tax
                ),
                None,
            );
        } else if totals.income_tax > totals.shu_before_tax {
            report.warning(
                "TAX_EXCEEDS_SHU",
                format!(
                    "Income tax ({}) exceeds SHU before tax ({})",
                    totals.income_tax, totals.shu_before_tax
                ),
                None,
            );
        }

        let previous = self.totals(Period::Previous);
        check_swing(
            &mut report,
            "totals.operating_revenue".to_string(),
            "Operating revenue",
            totals.operating_revenue,
            previous.operating_revenue,
            thresholds.swing_warning_pct,
        );
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

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::validation::has_blocking_errors;

    pub(crate) fn line(code: &str, category: IncomeCategory, current: i64, previous: i64) -> IncomeStatementLine {
        IncomeStatementLine {
            account_code: code.to_string(),
            account_name: format!("Account {}", code),
            category,
            current_amount: current,
            previous_amount: previous,
        }
    }

    pub(crate) fn statement() -> IncomeStatement {
        use IncomeCategory::*;
        IncomeStatement {
            lines: vec![
                line("4-100", OperatingRevenue, 500_000, 450_000),
                line("5-100", CostOfRevenue, 200_000, 180_000),
                line("6-100", OperatingExpense, 180_000, 170_000),
                line("7-100", OtherIncome, 30_000, 25_000),
                line("7-200", OtherExpense, 10_000, 9_000),
                line("8-100", IncomeTax, 14_000, 11_600),
            ],
        }
    }

    #[test]
    fn test_shu_arithmetic() {
        let t = statement().totals(Period::Current);
        assert_eq!(t.gross_profit, 300_000);
        assert_eq!(t.operating_shu, 120_000);
        assert_eq!(t.shu_before_tax, 140_000);
        assert_eq!(t.shu_after_tax, 126_000);
        assert_eq!(t.total_revenue(), 530_000);
        assert_eq!(t.total_expense(), 390_000);
    }

    #[test]
    fn test_valid_statement() {
        let report = statement().validate(&Thresholds::default());
        assert!(!has_blocking_errors(&report), "{:?}", report);
        assert_eq!(report.warnings().count(), 0);
    }

    #[test]
    fn test_missing_revenue_is_error() {
        let mut s = statement();
        s.lines.remove(0);
        assert!(s.validate(&Thresholds::default()).has_code("NO_REVENUE"));
    }

    #[test]
    fn test_tax_on_loss_warns() {
        let mut s = statement();
        s.lines[2].current_amount = 400_000;
        let report = s.validate(&Thresholds::default());
        assert!(report.has_code("TAX_ON_LOSS"));
        assert!(!has_blocking_errors(&report));
    }

    #[test]
    fn test_tax_exceeding_shu_warns() {
        let mut s = statement();
        s.lines[5].current_amount = 150_000;
        assert!(s.validate(&Thresholds::default()).has_code("TAX_EXCEEDS_SHU"));
    }
}

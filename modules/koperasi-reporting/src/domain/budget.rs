//! Budget plan (rencana anggaran pendapatan dan belanja) and realization

use serde::{Deserialize, Serialize};

use super::income_statement::IncomeStatementTotals;
use super::validation::{
    check_duplicates, check_non_negative, check_not_blank, percent_change, Thresholds,
    ValidationReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "budget_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BudgetCategory {
    Revenue,
    Expense,
    CapitalExpenditure,
}

impl BudgetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetCategory::Revenue => "revenue",
            BudgetCategory::Expense => "expense",
            BudgetCategory::CapitalExpenditure => "capital_expenditure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BudgetLine {
    pub category: BudgetCategory,
    pub account_name: String,
    /// Realized amount of the prior year, 0 for new lines
    #[serde(default)]
    pub previous_realization: i64,
    pub budget_amount: i64,
}

impl BudgetLine {
    pub fn growth_pct(&self) -> Option<f64> {
        percent_change(self.budget_amount, self.previous_realization)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BudgetPlan {
    pub lines: Vec<BudgetLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BudgetTotals {
    pub revenue: i64,
    pub expense: i64,
    pub capital_expenditure: i64,
    /// revenue - expense - capital expenditure
    pub planned_surplus: i64,
}

impl BudgetPlan {
    pub fn totals(&self) -> BudgetTotals {
        let mut t = BudgetTotals::default();
        for line in &self.lines {
            match line.category {
                BudgetCategory::Revenue => t.revenue += line.budget_amount,
                BudgetCategory::Expense => t.expense += line.budget_amount,
                BudgetCategory::CapitalExpenditure => t.capital_expenditure += line.budget_amount,
            }
        }
        t.planned_surplus = t.revenue - t.expense - t.capital_expenditure;
        t
    }

    pub fn validate(&self, thresholds: &Thresholds) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.lines.is_empty() {
            report.error("EMPTY_REPORT", "Budget plan has no lines", None);
            return report;
        }

        for (idx, line) in self.lines.iter().enumerate() {
            check_not_blank(
                &mut report,
                format!("lines[{}].account_name", idx),
                "Account name",
                &line.account_name,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].budget_amount", idx),
                &line.account_name,
                line.budget_amount,
            );
            check_non_negative(
                &mut report,
                format!("lines[{}].previous_realization", idx),
                &line.account_name,
                line.previous_realization,
            );

            if let Some(growth) = line.growth_pct() {
                if growth > thresholds.budget_growth_warning_pct {
                    report.warning(
                        "AGGRESSIVE_BUDGET_GROWTH",
                        format!(
                            "'{}' is budgeted {:.1}% above last year's realization",
                            line.account_name, growth
                        ),
                        Some(format!("lines[{}].budget_amount", idx)),
                    );
                }
            }
        }

        let keys: Vec<String> = self
            .lines
            .iter()
            .map(|l| format!("{}:{}", l.category.as_str(), l.account_name.trim().to_lowercase()))
            .collect();
        check_duplicates(
            &mut report,
            "DUPLICATE_BUDGET_LINE",
            "budget line",
            keys.iter().map(|k| k.as_str()),
        );

        if !self.lines.iter().any(|l| l.category == BudgetCategory::Revenue) {
            report.warning("NO_REVENUE_BUDGET", "Budget plan has no revenue lines", None);
        }

        let totals = self.totals();
        if totals.planned_surplus < 0 {
            report.warning(
                "PLANNED_DEFICIT",
                format!("Budget plans a deficit of {}", -totals.planned_surplus),
                None,
            );
        }

        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealizationLine {
    pub category: BudgetCategory,
    pub budgeted: i64,
    pub actual: i64,
    /// actual - budgeted
    pub variance: i64,
    /// actual / budgeted * 100, None when nothing was budgeted
    pub absorption_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRealization {
    pub lines: Vec<RealizationLine>,
    pub planned_surplus: i64,
    pub actual_surplus: i64,
}

fn realization_line(category: BudgetCategory, budgeted: i64, actual: i64) -> RealizationLine {
    RealizationLine {
        category,
        budgeted,
        actual,
        variance: actual - budgeted,
        absorption_pct: if budgeted == 0 {
            None
        } else {
            Some(actual as f64 / budgeted as f64 * 100.0)
        },
    }
}

/// Compare a budget plan with the income statement of the same year.
/// Capital expenditure has no income statement counterpart and is only compared
/// when `actual_capex` is known.
pub fn realization(
    plan: &BudgetPlan,
    actual: &IncomeStatementTotals,
    actual_capex: Option<i64>,
) -> BudgetRealization {
    let budget = plan.totals();
    let mut lines = vec![
        realization_line(BudgetCategory::Revenue, budget.revenue, actual.total_revenue()),
        realization_line(BudgetCategory::Expense, budget.expense, actual.total_expense()),
    ];
    if let Some(capex) = actual_capex {
        lines.push(realization_line(
            BudgetCategory::CapitalExpenditure,
            budget.capital_expenditure,
            capex,
        ));
    }

    BudgetRealization {
        lines,
        planned_surplus: budget.planned_surplus,
        actual_surplus: actual.shu_before_tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::income_statement::tests::statement;
    use crate::domain::report::Period;
    use crate::domain::validation::has_blocking_errors;

    fn line(category: BudgetCategory, name: &str, previous: i64, budget: i64) -> BudgetLine {
        BudgetLine {
            category,
            account_name: name.to_string(),
            previous_realization: previous,
            budget_amount: budget,
        }
    }

    fn plan() -> BudgetPlan {
        BudgetPlan {
            lines: vec![
                line(BudgetCategory::Revenue, "Pendapatan jasa pinjaman", 450_000, 520_000),
                line(BudgetCategory::Expense, "Beban operasional", 350_000, 380_000),
                line(BudgetCategory::CapitalExpenditure, "Komputer", 0, 20_000),
            ],
        }
    }

    #[test]
    fn test_totals() {
        let t = plan().totals();
        assert_eq!(t.revenue, 520_000);
        assert_eq!(t.planned_surplus, 120_000);
    }

    #[test]
    fn test_valid_plan() {
        let report = plan().validate(&Thresholds::default());
        assert!(report.issues.is_empty(), "{:?}", report);
    }

    #[test]
    fn test_aggressive_growth_and_deficit_warn() {
        let mut p = plan();
        p.lines[1].budget_amount = 600_000;
        let report = p.validate(&Thresholds::default());
        assert!(report.has_code("AGGRESSIVE_BUDGET_GROWTH"));
        assert!(report.has_code("PLANNED_DEFICIT"));
        assert!(!has_blocking_errors(&report));
    }

    #[test]
    fn test_duplicate_lines_ignore_case() {
        let mut p = plan();
        p.lines.push(line(BudgetCategory::Expense, "beban operasional", 0, 1));
        assert!(p.validate(&Thresholds::default()).has_code("DUPLICATE_BUDGET_LINE"));
    }

    #[test]
    fn test_realization_against_income_statement() {
        let actual = statement().totals(Period::Current);
        let r = realization(&plan(), &actual, None);
        assert_eq!(r.lines.len(), 2);
        assert_eq!(r.lines[0].actual, 530_000);
        assert_eq!(r.lines[0].variance, 10_000);
        assert_eq!(r.lines[1].actual, 390_000);
        assert!((r.lines[1].absorption_pct.unwrap() - 102.63).abs() < 0.01);
        assert_eq!(r.actual_surplus, 140_000);
    }
}

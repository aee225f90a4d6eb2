//! Line items of every report type
//!
//! Each report type keeps its lines in its own table keyed by `report_id` and
//! ordered by `sort_order`. Scalar fields (cash balances, SHU figures) live in
//! the header's `data` column.

use serde::Deserialize;
use sqlx::{Executor, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use super::report_repo::ReportHeader;
use crate::domain::balance_sheet::{BalanceSheet, BalanceSheetLine};
use crate::domain::budget::{BudgetLine, BudgetPlan};
use crate::domain::cash_flow::{CashFlowLine, CashFlowStatement};
use crate::domain::equity_changes::{EquityChangeLine, EquityChangesStatement};
use crate::domain::income_statement::{IncomeStatement, IncomeStatementLine};
use crate::domain::member_receivables::{MemberReceivableLine, MemberReceivablesReport};
use crate::domain::member_savings::{MemberSavingLine, MemberSavingsReport};
use crate::domain::non_performing::{NonPerformingLine, NonPerformingReport};
use crate::domain::report::{ReportContent, ReportType};
use crate::domain::shu::{ShuAllocationLine, ShuDistribution};

#[derive(Debug, Error)]
pub enum LineRepoError {
    #[error("Report header data is malformed: {0}")]
    HeaderData(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub fn table_for(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::BalanceSheet => "balance_sheet_accounts",
        ReportType::IncomeStatement => "income_statement_accounts",
        ReportType::CashFlow => "cash_flow_activities",
        ReportType::EquityChanges => "equity_changes",
        ReportType::MemberSavings => "member_savings",
        ReportType::MemberReceivables => "member_receivables",
        ReportType::NonPerformingReceivables => "non_performing_receivables",
        ReportType::ShuDistribution => "shu_distributions",
        ReportType::BudgetPlan => "budget_plans",
    }
}

#[derive(Debug, Default, Deserialize)]
struct CashHeader {
    #[serde(default)]
    beginning_cash: i64,
    #[serde(default)]
    ending_cash: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ShuHeader {
    #[serde(default)]
    shu_before_tax: i64,
    #[serde(default)]
    income_tax: i64,
    #[serde(default)]
    shu_after_tax: i64,
}

/// Load the typed content of a report: its lines plus the header scalars
pub async fn load_content<'e, E>(
    executor: E,
    header: &ReportHeader,
) -> Result<ReportContent, LineRepoError>
where
    E: Executor<'e, Database = Postgres>,
{
    let id = header.id;
    let content = match header.report_type {
        ReportType::BalanceSheet => {
            let lines = sqlx::query_as::<_, BalanceSheetLine>(
                r#"
                SELECT account_code, account_name, category, role, is_contra, current_amount, previous_amount
                FROM balance_sheet_accounts
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::BalanceSheet(BalanceSheet { lines })
        }
        ReportType::IncomeStatement => {
            let lines = sqlx::query_as::<_, IncomeStatementLine>(
                r#"
                SELECT account_code, account_name, category, current_amount, previous_amount
                FROM income_statement_accounts
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::IncomeStatement(IncomeStatement { lines })
        }
        ReportType::CashFlow => {
            let cash: CashHeader = serde_json::from_value(header.data.clone())?;
            let lines = sqlx::query_as::<_, CashFlowLine>(
                r#"
                SELECT activity, description, amount
                FROM cash_flow_activities
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::CashFlow(CashFlowStatement {
                beginning_cash: cash.beginning_cash,
                ending_cash: cash.ending_cash,
                lines,
            })
        }
        ReportType::EquityChanges => {
            let lines = sqlx::query_as::<_, EquityChangeLine>(
                r#"
                SELECT component, beginning_balance, additions, reductions, ending_balance
                FROM equity_changes
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::EquityChanges(EquityChangesStatement { lines })
        }
        ReportType::MemberSavings => {
            let lines = sqlx::query_as::<_, MemberSavingLine>(
                r#"
                SELECT member_number, member_name, principal_savings, mandatory_savings,
                       voluntary_savings, annual_transactions
                FROM member_savings
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::MemberSavings(MemberSavingsReport { lines })
        }
        ReportType::MemberReceivables => {
            let lines = sqlx::query_as::<_, MemberReceivableLine>(
                r#"
                SELECT member_number, member_name, loan_amount, outstanding_balance,
                       days_overdue, collectibility
                FROM member_receivables
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::MemberReceivables(MemberReceivablesReport { lines })
        }
        ReportType::NonPerformingReceivables => {
            let lines = sqlx::query_as::<_, NonPerformingLine>(
                r#"
                SELECT member_number, member_name, outstanding_balance, days_overdue,
                       collectibility, collateral_value, provision_amount
                FROM non_performing_receivables
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::NonPerformingReceivables(NonPerformingReport { lines })
        }
        ReportType::ShuDistribution => {
            let shu: ShuHeader = serde_json::from_value(header.data.clone())?;
            let allocations = sqlx::query_as::<_, ShuAllocationLine>(
                r#"
                SELECT component, percentage, amount
                FROM shu_distributions
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::ShuDistribution(ShuDistribution {
                shu_before_tax: shu.shu_before_tax,
                income_tax: shu.income_tax,
                shu_after_tax: shu.shu_after_tax,
                allocations,
            })
        }
        ReportType::BudgetPlan => {
            let lines = sqlx::query_as::<_, BudgetLine>(
                r#"
                SELECT category, account_name, previous_realization, budget_amount
                FROM budget_plans
                WHERE report_id = $1
                ORDER BY sort_order
                "#,
            )
            .bind(id)
            .fetch_all(executor)
            .await?;
            ReportContent::BudgetPlan(BudgetPlan { lines })
        }
    };

    Ok(content)
}

pub async fn delete_lines_tx(
    tx: &mut Transaction<'_, Postgres>,
    report_id: Uuid,
    report_type: ReportType,
) -> Result<u64, LineRepoError> {
    let sql = format!("DELETE FROM {} WHERE report_id = $1", table_for(report_type));
    let result = sqlx::query(&sql).bind(report_id).execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

/// Replace all lines of a report with the given content
pub async fn replace_lines_tx(
    tx: &mut Transaction<'_, Postgres>,
    report_id: Uuid,
    content: &ReportContent,
) -> Result<(), LineRepoError> {
    delete_lines_tx(tx, report_id, content.report_type()).await?;

    match content {
        ReportContent::BalanceSheet(r) => {
            for (idx, l) in r.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO balance_sheet_accounts
                        (report_id, account_code, account_name, category, role, is_contra,
                         current_amount, previous_amount, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(report_id)
                .bind(&l.account_code)
                .bind(&l.account_name)
                .bind(l.category)
                .bind(l.role)
                .bind(l.is_contra)
                .bind(l.current_amount)
                .bind(l.previous_amount)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        ReportContent::IncomeStatement(r) => {
            for (idx, l) in r.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO income_statement_accounts
                        (report_id, account_code, account_name, category, current_amount,
                         previous_amount, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(report_id)
                .bind(&l.account_code)
                .bind(&l.account_name)
                .bind(l.category)
                .bind(l.current_amount)
                .bind(l.previous_amount)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        ReportContent::CashFlow(r) => {
            for (idx, l) in r.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO cash_flow_activities (report_id, activity, description, amount, sort_order)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(report_id)
                .bind(l.activity)
                .bind(&l.description)
                .bind(l.amount)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        ReportContent::EquityChanges(r) => {
            for (idx, l) in r.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO equity_changes
                        (report_id, component, beginning_balance, additions, reductions,
                         ending_balance, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(report_id)
                .bind(l.component)
                .bind(l.beginning_balance)
                .bind(l.additions)
                .bind(l.reductions)
                .bind(l.ending_balance)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        ReportContent::MemberSavings(r) => {
            for (idx, l) in r.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO member_savings
                        (report_id, member_number, member_name, principal_savings, mandatory_savings,
                         voluntary_savings, annual_transactions, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(report_id)
                .bind(&l.member_number)
                .bind(&l.member_name)
                .bind(l.principal_savings)
                .bind(l.mandatory_savings)
                .bind(l.voluntary_savings)
                .bind(l.annual_transactions)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        ReportContent::MemberReceivables(r) => {
            for (idx, l) in r.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO member_receivables
                        (report_id, member_number, member_name, loan_amount, outstanding_balance,
                         days_overdue, collectibility, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(report_id)
                .bind(&l.member_number)
                .bind(&l.member_name)
                .bind(l.loan_amount)
                .bind(l.outstanding_balance)
                .bind(l.days_overdue)
                .bind(l.collectibility)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        ReportContent::NonPerformingReceivables(r) => {
            for (idx, l) in r.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO non_performing_receivables
                        (report_id, member_number, member_name, outstanding_balance, days_overdue,
                         collectibility, collateral_value, provision_amount, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(report_id)
                .bind(&l.member_number)
                .bind(&l.member_name)
                .bind(l.outstanding_balance)
                .bind(l.days_overdue)
                .bind(l.collectibility)
                .bind(l.collateral_value)
                .bind(l.provision_amount)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        ReportContent::ShuDistribution(r) => {
            for (idx, l) in r.allocations.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO shu_distributions (report_id, component, percentage, amount, sort_order)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(report_id)
                .bind(l.component)
                .bind(l.percentage)
                .bind(l.amount)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        ReportContent::BudgetPlan(r) => {
            for (idx, l) in r.lines.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO budget_plans
                        (report_id, category, account_name, previous_realization, budget_amount, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(report_id)
                .bind(l.category)
                .bind(&l.account_name)
                .bind(l.previous_realization)
                .bind(l.budget_amount)
                .bind(idx as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_has_its_own_table() {
        let mut tables: Vec<&str> = ReportType::ALL.iter().map(|t| table_for(*t)).collect();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), ReportType::ALL.len());
    }

    #[test]
    fn test_header_data_round_trips_through_loader_structs() {
        let content = ReportContent::CashFlow(CashFlowStatement {
            beginning_cash: 35_000,
            ending_cash: 40_000,
            lines: vec![],
        });
        let cash: CashHeader = serde_json::from_value(content.header_data()).unwrap();
        assert_eq!(cash.beginning_cash, 35_000);
        assert_eq!(cash.ending_cash, 40_000);

        let empty: ShuHeader = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty.shu_after_tax, 0);
    }
}

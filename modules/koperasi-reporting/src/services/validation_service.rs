//! Validation Service
//!
//! Statement validation for stored and unsaved reports, and cross-report
//! consistency for a cooperative's reporting year.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::consistency::{check_consistency, ConsistencySummary, ReportSet};
use crate::domain::report::{ReportContent, ReportStatus, ReportType};
use crate::domain::validation::{has_blocking_errors, Thresholds, ValidationReport};
use crate::repos::line_repo;
use crate::repos::report_repo::{self, ReportHeader};
use crate::services::report_service::{check_year, ReportServiceError};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<Uuid>,
    pub report_type: ReportType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    /// False when any issue has Error severity
    pub can_submit: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub validation_report: ValidationReport,
}

impl ValidationOutcome {
    pub fn new(content: &ReportContent, validation_report: ValidationReport) -> Self {
        Self {
            report_id: None,
            report_type: content.report_type(),
            status: None,
            can_submit: !has_blocking_errors(&validation_report),
            error_count: validation_report.errors().count(),
            warning_count: validation_report.warnings().count(),
            validation_report,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyResponse {
    pub cooperative_id: Uuid,
    pub reporting_year: i32,
    #[serde(flatten)]
    pub summary: ConsistencySummary,
}

/// Validate content that has not been saved
pub fn validate_content(content: &ReportContent, thresholds: &Thresholds) -> ValidationOutcome {
    ValidationOutcome::new(content, content.validate(thresholds))
}

/// Validate a stored report as it would be validated on submit
pub async fn validate_report(
    pool: &PgPool,
    thresholds: &Thresholds,
    cooperative_id: Uuid,
    id: Uuid,
) -> Result<ValidationOutcome, ReportServiceError> {
    let header = report_repo::find_by_id(pool, cooperative_id, id)
        .await?
        .ok_or(ReportServiceError::NotFound(id))?;
    let content = line_repo::load_content(pool, &header).await?;

    let mut outcome = validate_content(&content, thresholds);
    outcome.report_id = Some(header.id);
    outcome.status = Some(header.status);
    Ok(outcome)
}

/// Place loaded content into its slot of a report set
fn place(set: &mut ReportSet, content: ReportContent) {
    match content {
        ReportContent::BalanceSheet(r) => set.balance_sheet = Some(r),
        ReportContent::IncomeStatement(r) => set.income_statement = Some(r),
        ReportContent::CashFlow(r) => set.cash_flow = Some(r),
        ReportContent::EquityChanges(r) => set.equity_changes = Some(r),
        ReportContent::MemberSavings(r) => set.member_savings = Some(r),
        ReportContent::MemberReceivables(r) => set.member_receivables = Some(r),
        ReportContent::NonPerformingReceivables(r) => set.non_performing = Some(r),
        ReportContent::ShuDistribution(r) => set.shu_distribution = Some(r),
        // Budget plans take no part in cross-report checks
        ReportContent::BudgetPlan(_) => {}
    }
}

/// Load the non-rejected reports of a year. The headers are returned too so
/// callers can look at statuses.
pub async fn load_report_set(
    pool: &PgPool,
    cooperative_id: Uuid,
    year: i32,
) -> Result<(ReportSet, Vec<ReportHeader>), ReportServiceError> {
    let headers = report_repo::list_for_year(pool, cooperative_id, year).await?;

    let mut set = ReportSet::default();
    for header in &headers {
        let content = line_repo::load_content(pool, header).await?;
        place(&mut set, content);
    }

    let previous = report_repo::list(
        pool,
        cooperative_id,
        &report_repo::ReportFilter {
            year: Some(year - 1),
            report_type: Some(ReportType::BalanceSheet),
            status: None,
        },
    )
    .await?;
    if let Some(header) = previous
        .iter()
        .find(|h| h.status != ReportStatus::Rejected)
    {
        if let ReportContent::BalanceSheet(bs) = line_repo::load_content(pool, header).await? {
            set.previous_balance_sheet = Some(bs);
        }
    }

    Ok((set, headers))
}

pub async fn check_year_consistency(
    pool: &PgPool,
    thresholds: &Thresholds,
    cooperative_id: Uuid,
    year: i32,
) -> Result<ConsistencyResponse, ReportServiceError> {
    check_year(year)?;
    let (set, _) = load_report_set(pool, cooperative_id, year).await?;
    let summary = check_consistency(&set, thresholds.consistency_tolerance);

    tracing::info!(
        %cooperative_id,
        year,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Consistency checked"
    );

    Ok(ConsistencyResponse {
        cooperative_id,
        reporting_year: year,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::budget::BudgetPlan;
    use crate::domain::cash_flow::CashFlowStatement;

    #[test]
    fn test_outcome_counts() {
        let content = ReportContent::CashFlow(CashFlowStatement {
            beginning_cash: 100,
            ending_cash: 90,
            lines: vec![],
        });
        let outcome = validate_content(&content, &Thresholds::default());
        assert!(!outcome.can_submit);
        assert!(outcome.error_count >= 1);
        assert_eq!(outcome.report_type, ReportType::CashFlow);
        assert!(outcome.report_id.is_none());
    }

    #[test]
    fn test_budget_plans_are_not_placed() {
        let mut set = ReportSet::default();
        place(&mut set, ReportContent::BudgetPlan(BudgetPlan::default()));
        assert!(set.balance_sheet.is_none());
        place(
            &mut set,
            ReportContent::CashFlow(CashFlowStatement::default()),
        );
        assert!(set.cash_flow.is_some());
    }
}

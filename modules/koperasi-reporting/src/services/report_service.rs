//! Report Service
//!
//! Draft creation, retrieval, content edits and deletion. Every change writes
//! an audit row inside the same transaction as the change itself.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::report::{InvalidTransition, ReportAction, ReportContent, ReportType};
use crate::domain::validation::check_limits;
use crate::repos::audit_repo::{self, AuditRepoError, NewAuditEntry};
use crate::repos::cooperative_repo::{self, CooperativeRepoError};
use crate::repos::line_repo::{self, LineRepoError};
use crate::repos::report_repo::{self, ReportFilter, ReportHeader, ReportRepoError};

pub const MIN_REPORTING_YEAR: i32 = 1900;
pub const MAX_REPORTING_YEAR: i32 = 2100;

#[derive(Debug, Error)]
pub enum ReportServiceError {
    #[error("Report not found: {0}")]
    NotFound(Uuid),

    #[error("Cooperative not found: {0}")]
    CooperativeNotFound(Uuid),

    #[error("A {report_type} report for {year} already exists")]
    Duplicate { report_type: ReportType, year: i32 },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Report is a {expected} report, content for {got} was given")]
    TypeMismatch { expected: ReportType, got: ReportType },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stored report data is malformed: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ReportRepoError> for ReportServiceError {
    fn from(e: ReportRepoError) -> Self {
        match e {
            ReportRepoError::Duplicate { report_type, year } => {
                ReportServiceError::Duplicate { report_type, year }
            }
            ReportRepoError::Database(e) => ReportServiceError::Database(e),
        }
    }
}

impl From<LineRepoError> for ReportServiceError {
    fn from(e: LineRepoError) -> Self {
        match e {
            LineRepoError::HeaderData(e) => ReportServiceError::Corrupt(e.to_string()),
            LineRepoError::Database(e) => ReportServiceError::Database(e),
        }
    }
}

impl From<AuditRepoError> for ReportServiceError {
    fn from(e: AuditRepoError) -> Self {
        match e {
            AuditRepoError::Database(e) => ReportServiceError::Database(e),
        }
    }
}

impl From<CooperativeRepoError> for ReportServiceError {
    fn from(e: CooperativeRepoError) -> Self {
        match e {
            CooperativeRepoError::NotFound(id) => ReportServiceError::CooperativeNotFound(id),
            CooperativeRepoError::Database(e) => ReportServiceError::Database(e),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    pub reporting_year: i32,
    pub created_by: Uuid,
    pub report_type: ReportType,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReportRequest {
    pub actor_id: Uuid,
    pub report_type: ReportType,
    pub content: serde_json::Value,
}

/// A report header together with its typed content
#[derive(Debug, Clone, Serialize)]
pub struct ReportDetail {
    pub report: ReportHeader,
    pub content: ReportContent,
}

pub fn check_year(year: i32) -> Result<(), ReportServiceError> {
    if !(MIN_REPORTING_YEAR..=MAX_REPORTING_YEAR).contains(&year) {
        return Err(ReportServiceError::InvalidRequest(format!(
            "reporting_year must be between {} and {}, got {}",
            MIN_REPORTING_YEAR, MAX_REPORTING_YEAR, year
        )));
    }
    Ok(())
}

/// Parse a request body into typed content
pub fn parse_content(
    report_type: ReportType,
    content: serde_json::Value,
) -> Result<ReportContent, ReportServiceError> {
    check_limits(&content).map_err(|e| {
        ReportServiceError::InvalidRequest(format!("Invalid {} content: {}", report_type, e))
    })?;
    ReportContent::from_parts(report_type, content).map_err(|e| {
        ReportServiceError::InvalidRequest(format!("Invalid {} content: {}", report_type, e))
    })
}

/// Audit snapshot of a header: status plus the scalar data
fn audit_values(header: &ReportHeader, line_count: usize) -> serde_json::Value {
    serde_json::json!({
        "status": header.status,
        "report_type": header.report_type,
        "reporting_year": header.reporting_year,
        "data": header.data,
        "line_count": line_count,
    })
}

/// Create a draft report with its lines
pub async fn create_report(
    pool: &PgPool,
    cooperative_id: Uuid,
    request: CreateReportRequest,
) -> Result<ReportDetail, ReportServiceError> {
    check_year(request.reporting_year)?;
    let content = parse_content(request.report_type, request.content)?;
    cooperative_repo::get(pool, cooperative_id).await?;

    let mut tx = pool.begin().await?;

    let header = report_repo::insert_tx(
        &mut tx,
        cooperative_id,
        content.report_type(),
        request.reporting_year,
        &content.header_data(),
        request.created_by,
    )
    .await?;

    line_repo::replace_lines_tx(&mut tx, header.id, &content).await?;

    audit_repo::insert_tx(
        &mut tx,
        NewAuditEntry {
            cooperative_id,
            actor_id: request.created_by,
            action: "report.created",
            entity_type: "financial_report",
            entity_id: header.id,
            old_values: None,
            new_values: Some(audit_values(&header, content.line_count())),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        report_id = %header.id,
        %cooperative_id,
        report_type = %header.report_type,
        year = header.reporting_year,
        lines = content.line_count(),
        "Report draft created"
    );

    Ok(ReportDetail {
        report: header,
        content,
    })
}

pub async fn get_report(
    pool: &PgPool,
    cooperative_id: Uuid,
    id: Uuid,
) -> Result<ReportDetail, ReportServiceError> {
    let header = report_repo::find_by_id(pool, cooperative_id, id)
        .await?
        .ok_or(ReportServiceError::NotFound(id))?;
    let content = line_repo::load_content(pool, &header).await?;

    Ok(ReportDetail {
        report: header,
        content,
    })
}

pub async fn list_reports(
    pool: &PgPool,
    cooperative_id: Uuid,
    filter: &ReportFilter,
) -> Result<Vec<ReportHeader>, ReportServiceError> {
    if let Some(year) = filter.year {
        check_year(year)?;
    }
    Ok(report_repo::list(pool, cooperative_id, filter).await?)
}

/// Replace the content of a draft or rejected report. A rejected report goes
/// back to draft and loses its rejection reason.
pub async fn update_report(
    pool: &PgPool,
    cooperative_id: Uuid,
    id: Uuid,
    request: UpdateReportRequest,
) -> Result<ReportDetail, ReportServiceError> {
    let content = parse_content(request.report_type, request.content)?;

    let mut tx = pool.begin().await?;

    let current = report_repo::find_for_update_tx(&mut tx, cooperative_id, id)
        .await?
        .ok_or(ReportServiceError::NotFound(id))?;

    current.status.apply(ReportAction::Edit)?;
    if current.report_type != content.report_type() {
        return Err(ReportServiceError::TypeMismatch {
            expected: current.report_type,
            got: content.report_type(),
        });
    }

    let updated = report_repo::update_content_tx(&mut tx, id, &content.header_data()).await?;
    line_repo::replace_lines_tx(&mut tx, id, &content).await?;

    audit_repo::insert_tx(
        &mut tx,
        NewAuditEntry {
            cooperative_id,
            actor_id: request.actor_id,
            action: "report.updated",
            entity_type: "financial_report",
            entity_id: id,
            old_values: Some(serde_json::json!({
                "status": current.status,
                "data": current.data,
            })),
            new_values: Some(audit_values(&updated, content.line_count())),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        report_id = %id,
        %cooperative_id,
        from_status = %current.status,
        "Report content updated"
    );

    Ok(ReportDetail {
        report: updated,
        content,
    })
}

/// Delete a draft or rejected report and its lines
pub async fn delete_report(
    pool: &PgPool,
    cooperative_id: Uuid,
    id: Uuid,
    actor_id: Uuid,
) -> Result<(), ReportServiceError> {
    let mut tx = pool.begin().await?;

    let current = report_repo::find_for_update_tx(&mut tx, cooperative_id, id)
        .await?
        .ok_or(ReportServiceError::NotFound(id))?;

    current.status.apply(ReportAction::Delete)?;

    let removed = line_repo::delete_lines_tx(&mut tx, id, current.report_type).await?;
    report_repo::delete_tx(&mut tx, id).await?;

    audit_repo::insert_tx(
        &mut tx,
        NewAuditEntry {
            cooperative_id,
            actor_id,
            action: "report.deleted",
            entity_type: "financial_report",
            entity_id: id,
            old_values: Some(audit_values(&current, removed as usize)),
            new_values: None,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(report_id = %id, %cooperative_id, "Report deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_bounds() {
        assert!(check_year(2024).is_ok());
        assert!(check_year(1900).is_ok());
        assert!(matches!(
            check_year(24),
            Err(ReportServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_parse_content_names_the_type() {
        let err = parse_content(
            ReportType::MemberSavings,
            serde_json::json!({ "lines": [{ "member_number": "A-1" }] }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("member_savings"));
    }

    #[test]
    fn test_repo_errors_map_to_service_errors() {
        let err: ReportServiceError = ReportRepoError::Duplicate {
            report_type: ReportType::BudgetPlan,
            year: 2025,
        }
        .into();
        assert!(matches!(err, ReportServiceError::Duplicate { year: 2025, .. }));

        let err: ReportServiceError = CooperativeRepoError::NotFound(Uuid::nil()).into();
        assert!(matches!(err, ReportServiceError::CooperativeNotFound(_)));
    }
}

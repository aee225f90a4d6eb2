//! Workflow Service
//!
//! Lifecycle transitions of a report: submit, approve and reject.
//!
//! Each transition runs in one transaction:
//! 1. Lock the header row (`FOR UPDATE`)
//! 2. Ask the lifecycle table for the next status
//! 3. On submit, validate the stored content; blocking errors abort
//! 4. Update the header, write the audit row, fan out notifications
//! 5. Commit, then drop the cooperative's cached dashboards

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::DashboardCache;
use crate::domain::report::{InvalidTransition, ReportAction, ReportStatus};
use crate::domain::validation::{has_blocking_errors, Thresholds, ValidationReport};
use crate::metrics::Metrics;
use crate::repos::audit_repo::{self, AuditRepoError, NewAuditEntry};
use crate::repos::cooperative_repo::{self, CooperativeRepoError, UserRole};
use crate::repos::line_repo::{self, LineRepoError};
use crate::repos::notification_repo::{self, NewNotification, NotificationRepoError};
use crate::repos::report_repo::{self, ReportHeader, ReportRepoError};
use crate::services::analytics_service;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Report not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Report has {} blocking validation error(s)", .0.errors().count())]
    ValidationFailed(ValidationReport),

    #[error("A rejection reason is required")]
    ReasonRequired,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ReportRepoError> for WorkflowError {
    fn from(e: ReportRepoError) -> Self {
        match e {
            ReportRepoError::Database(e) => WorkflowError::Database(e),
            other => WorkflowError::Internal(other.to_string()),
        }
    }
}

impl From<LineRepoError> for WorkflowError {
    fn from(e: LineRepoError) -> Self {
        match e {
            LineRepoError::HeaderData(e) => {
                WorkflowError::Internal(format!("Stored report data is malformed: {}", e))
            }
            LineRepoError::Database(e) => WorkflowError::Database(e),
        }
    }
}

impl From<AuditRepoError> for WorkflowError {
    fn from(e: AuditRepoError) -> Self {
        match e {
            AuditRepoError::Database(e) => WorkflowError::Database(e),
        }
    }
}

impl From<NotificationRepoError> for WorkflowError {
    fn from(e: NotificationRepoError) -> Self {
        match e {
            NotificationRepoError::Database(e) => WorkflowError::Database(e),
            other => WorkflowError::Internal(other.to_string()),
        }
    }
}

impl From<CooperativeRepoError> for WorkflowError {
    fn from(e: CooperativeRepoError) -> Self {
        match e {
            CooperativeRepoError::Database(e) => WorkflowError::Database(e),
            other => WorkflowError::Internal(other.to_string()),
        }
    }
}

/// Shared handles a transition needs besides the request itself
#[derive(Clone, Copy)]
pub struct WorkflowDeps<'a> {
    pub pool: &'a PgPool,
    pub cache: &'a DashboardCache,
    pub metrics: &'a Metrics,
    pub thresholds: &'a Thresholds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveRequest {
    pub reviewer_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectRequest {
    pub reviewer_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub report: ReportHeader,
    /// Warnings found on submit; absent for review decisions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_report: Option<ValidationReport>,
    pub notified_users: usize,
}

/// Notification sent after a transition, or None for actions nobody is told about
pub fn notification_for(action: ReportAction, header: &ReportHeader) -> Option<NewNotification> {
    let subject = format!("{} {}", header.report_type.label(), header.reporting_year);
    let (kind, title, message) = match action {
        ReportAction::Submit => (
            "report_submitted",
            "Report submitted for review".to_string(),
            format!("{} was submitted and is waiting for review", subject),
        ),
        ReportAction::Approve => (
            "report_approved",
            "Report approved".to_string(),
            format!("{} was approved", subject),
        ),
        ReportAction::Reject => (
            "report_rejected",
            "Report rejected".to_string(),
            format!(
                "{} was rejected: {}",
                subject,
                header.rejection_reason.as_deref().unwrap_or("no reason given")
            ),
        ),
        ReportAction::Edit | ReportAction::Delete => return None,
    };

    Some(NewNotification {
        cooperative_id: Some(header.cooperative_id),
        kind,
        title,
        message,
        report_id: Some(header.id),
    })
}

/// Recipients of a transition's notification: admins review submissions,
/// the cooperative's own users hear about decisions
fn recipients(action: ReportAction, cooperative_id: Uuid) -> (UserRole, Option<Uuid>) {
    match action {
        ReportAction::Submit => (UserRole::Admin, None),
        _ => (UserRole::CooperativeUser, Some(cooperative_id)),
    }
}

fn result_label(result: &Result<TransitionOutcome, WorkflowError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(WorkflowError::ValidationFailed(_)) => "blocked",
        Err(
            WorkflowError::InvalidTransition(_)
            | WorkflowError::NotFound(_)
            | WorkflowError::ReasonRequired,
        ) => "invalid",
        Err(_) => "error",
    }
}

async fn notify_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    action: ReportAction,
    header: &ReportHeader,
) -> Result<usize, WorkflowError> {
    let Some(notification) = notification_for(action, header) else {
        return Ok(0);
    };
    let (role, scope) = recipients(action, header.cooperative_id);
    let users = cooperative_repo::user_ids_by_role_tx(tx, role, scope).await?;
    Ok(notification_repo::insert_for_users_tx(tx, &users, &notification).await?)
}

/// Submit a draft for review. Blocking validation errors leave the report in
/// draft and are returned with the full validation report.
pub async fn submit(
    deps: WorkflowDeps<'_>,
    cooperative_id: Uuid,
    id: Uuid,
    request: SubmitRequest,
) -> Result<TransitionOutcome, WorkflowError> {
    let result = submit_inner(deps, cooperative_id, id, request).await;
    deps.metrics
        .record_transition(ReportAction::Submit.as_str(), result_label(&result));
    result
}

async fn submit_inner(
    deps: WorkflowDeps<'_>,
    cooperative_id: Uuid,
    id: Uuid,
    request: SubmitRequest,
) -> Result<TransitionOutcome, WorkflowError> {
    let mut tx = deps.pool.begin().await?;

    let current = report_repo::find_for_update_tx(&mut tx, cooperative_id, id)
        .await?
        .ok_or(WorkflowError::NotFound(id))?;
    current.status.apply(ReportAction::Submit)?;

    let content = line_repo::load_content(&mut *tx, &current).await?;
    let validation = content.validate(deps.thresholds);
    deps.metrics.record_validation(&validation);

    if has_blocking_errors(&validation) {
        tx.rollback().await?;
        tracing::info!(
            report_id = %id,
            %cooperative_id,
            errors = validation.errors().count(),
            "Submit blocked by validation errors"
        );
        return Err(WorkflowError::ValidationFailed(validation));
    }

    let updated = report_repo::mark_submitted_tx(&mut tx, id).await?;

    audit_repo::insert_tx(
        &mut tx,
        NewAuditEntry {
            cooperative_id,
            actor_id: request.actor_id,
            action: "report.submitted",
            entity_type: "financial_report",
            entity_id: id,
            old_values: Some(serde_json::json!({ "status": current.status })),
            new_values: Some(serde_json::json!({
                "status": updated.status,
                "warnings": validation.warnings().count(),
            })),
        },
    )
    .await?;

    let notified_users = notify_tx(&mut tx, ReportAction::Submit, &updated).await?;

    tx.commit().await?;
    deps.cache.invalidate_cooperative(cooperative_id);

    tracing::info!(
        report_id = %id,
        %cooperative_id,
        report_type = %updated.report_type,
        year = updated.reporting_year,
        notified_users,
        "Report submitted"
    );

    Ok(TransitionOutcome {
        report: updated,
        validation_report: Some(validation),
        notified_users,
    })
}

pub async fn approve(
    deps: WorkflowDeps<'_>,
    cooperative_id: Uuid,
    id: Uuid,
    request: ApproveRequest,
) -> Result<TransitionOutcome, WorkflowError> {
    let result = review(
        deps,
        cooperative_id,
        id,
        request.reviewer_id,
        ReportAction::Approve,
        None,
    )
    .await;
    deps.metrics
        .record_transition(ReportAction::Approve.as_str(), result_label(&result));

    if let Ok(outcome) = &result {
        let year = outcome.report.reporting_year;
        // KPI values are derived data; a failed refresh does not undo the approval
        if let Err(e) = analytics_service::refresh_kpis(deps.pool, cooperative_id, year).await {
            tracing::warn!(%cooperative_id, year, error = %e, "KPI refresh after approval failed");
        }
    }

    result
}

pub async fn reject(
    deps: WorkflowDeps<'_>,
    cooperative_id: Uuid,
    id: Uuid,
    request: RejectRequest,
) -> Result<TransitionOutcome, WorkflowError> {
    let reason = request.reason.trim();
    let result = if reason.is_empty() {
        Err(WorkflowError::ReasonRequired)
    } else {
        review(
            deps,
            cooperative_id,
            id,
            request.reviewer_id,
            ReportAction::Reject,
            Some(reason),
        )
        .await
    };
    deps.metrics
        .record_transition(ReportAction::Reject.as_str(), result_label(&result));
    result
}

async fn review(
    deps: WorkflowDeps<'_>,
    cooperative_id: Uuid,
    id: Uuid,
    reviewer_id: Uuid,
    action: ReportAction,
    reason: Option<&str>,
) -> Result<TransitionOutcome, WorkflowError> {
    let mut tx = deps.pool.begin().await?;

    let current = report_repo::find_for_update_tx(&mut tx, cooperative_id, id)
        .await?
        .ok_or(WorkflowError::NotFound(id))?;
    let next: ReportStatus = current.status.apply(action)?;

    let updated = report_repo::mark_reviewed_tx(&mut tx, id, next, reviewer_id, reason).await?;

    let audit_action = match action {
        ReportAction::Approve => "report.approved",
        _ => "report.rejected",
    };
    audit_repo::insert_tx(
        &mut tx,
        NewAuditEntry {
            cooperative_id,
            actor_id: reviewer_id,
            action: audit_action,
            entity_type: "financial_report",
            entity_id: id,
            old_values: Some(serde_json::json!({ "status": current.status })),
            new_values: Some(serde_json::json!({
                "status": updated.status,
                "rejection_reason": updated.rejection_reason,
            })),
        },
    )
    .await?;

    let notified_users = notify_tx(&mut tx, action, &updated).await?;

    tx.commit().await?;
    deps.cache.invalidate_cooperative(cooperative_id);

    tracing::info!(
        report_id = %id,
        %cooperative_id,
        %reviewer_id,
        status = %updated.status,
        notified_users,
        "Report reviewed"
    );

    Ok(TransitionOutcome {
        report: updated,
        validation_report: None,
        notified_users,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::ReportType;
    use chrono::Utc;

    fn header(status: ReportStatus, reason: Option<&str>) -> ReportHeader {
        ReportHeader {
            id: Uuid::new_v4(),
            cooperative_id: Uuid::new_v4(),
            report_type: ReportType::BalanceSheet,
            reporting_year: 2024,
            status,
            data: serde_json::json!({}),
            created_by: Uuid::new_v4(),
            submitted_at: None,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: reason.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_submit_notification() {
        let h = header(ReportStatus::Submitted, None);
        let n = notification_for(ReportAction::Submit, &h).unwrap();
        assert_eq!(n.kind, "report_submitted");
        assert_eq!(n.report_id, Some(h.id));
        assert_eq!(n.cooperative_id, Some(h.cooperative_id));
        assert!(n.message.contains("Neraca 2024"));
    }

    #[test]
    fn test_rejection_notification_carries_reason() {
        let h = header(ReportStatus::Rejected, Some("Saldo kas tidak sesuai"));
        let n = notification_for(ReportAction::Reject, &h).unwrap();
        assert_eq!(n.kind, "report_rejected");
        assert!(n.message.ends_with("Saldo kas tidak sesuai"));
    }

    #[test]
    fn test_edits_notify_nobody() {
        let h = header(ReportStatus::Draft, None);
        assert!(notification_for(ReportAction::Edit, &h).is_none());
        assert!(notification_for(ReportAction::Delete, &h).is_none());
    }

    #[test]
    fn test_recipients() {
        let coop = Uuid::new_v4();
        assert_eq!(recipients(ReportAction::Submit, coop), (UserRole::Admin, None));
        assert_eq!(
            recipients(ReportAction::Approve, coop),
            (UserRole::CooperativeUser, Some(coop))
        );
        assert_eq!(
            recipients(ReportAction::Reject, coop),
            (UserRole::CooperativeUser, Some(coop))
        );
    }

    #[test]
    fn test_result_labels() {
        let blocked = Err(WorkflowError::ValidationFailed(ValidationReport::new()));
        assert_eq!(result_label(&blocked), "blocked");
        assert_eq!(result_label(&Err(WorkflowError::ReasonRequired)), "invalid");
        let invalid = Err(WorkflowError::InvalidTransition(
            ReportStatus::Approved
                .apply(ReportAction::Submit)
                .unwrap_err(),
        ));
        assert_eq!(result_label(&invalid), "invalid");
        assert_eq!(result_label(&Err(WorkflowError::Internal("x".into()))), "error");
    }
}

//! HTTP error envelope shared by all handlers
//!
//! Service errors map onto status codes here. Database and IO failures are
//! logged in full and surfaced with a generic message.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::validation::ValidationReport;
use crate::repos::audit_repo::AuditRepoError;
use crate::repos::notification_repo::NotificationRepoError;
use crate::services::analytics_service::AnalyticsError;
use crate::services::dashboard_service::DashboardError;
use crate::services::export_service::ExportError;
use crate::services::report_service::ReportServiceError;
use crate::services::workflow_service::WorkflowError;

/// Error response wrapper
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_report: Option<ValidationReport>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub validation_report: Option<ValidationReport>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            validation_report: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn database(error: &sqlx::Error) -> Self {
        tracing::error!(error = %error, "Database error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    }

    fn internal(error: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %error, "Internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            validation_report: self.validation_report,
        });
        (self.status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<ReportServiceError> for ApiError {
    fn from(error: ReportServiceError) -> Self {
        match &error {
            ReportServiceError::NotFound(_) | ReportServiceError::CooperativeNotFound(_) => {
                ApiError::not_found(error.to_string())
            }
            ReportServiceError::Duplicate { .. } | ReportServiceError::InvalidTransition(_) => {
                ApiError::new(StatusCode::CONFLICT, error.to_string())
            }
            ReportServiceError::TypeMismatch { .. } | ReportServiceError::InvalidRequest(_) => {
                ApiError::bad_request(error.to_string())
            }
            ReportServiceError::Corrupt(_) => ApiError::internal(&error),
            ReportServiceError::Database(e) => ApiError::database(e),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        match error {
            WorkflowError::NotFound(_) => ApiError::not_found(error.to_string()),
            WorkflowError::InvalidTransition(_) => {
                ApiError::new(StatusCode::CONFLICT, error.to_string())
            }
            WorkflowError::ReasonRequired => ApiError::bad_request(error.to_string()),
            WorkflowError::ValidationFailed(report) => ApiError {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: format!(
                    "Report has {} blocking validation error(s)",
                    report.errors().count()
                ),
                validation_report: Some(report),
            },
            WorkflowError::Internal(_) => ApiError::internal(&error),
            WorkflowError::Database(e) => ApiError::database(&e),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(error: AnalyticsError) -> Self {
        match error {
            AnalyticsError::MissingReport(..) => ApiError::not_found(error.to_string()),
            AnalyticsError::InvalidRequest(_) => ApiError::bad_request(error.to_string()),
            AnalyticsError::Report(e) => e.into(),
            AnalyticsError::Database(e) => ApiError::database(&e),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(error: DashboardError) -> Self {
        match &error {
            DashboardError::CooperativeNotFound(_) => ApiError::not_found(error.to_string()),
            DashboardError::InvalidRequest(_) => ApiError::bad_request(error.to_string()),
            DashboardError::Internal(_) => ApiError::internal(&error),
            DashboardError::Database(e) => ApiError::database(e),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(error: ExportError) -> Self {
        match &error {
            ExportError::NotFound(_) => ApiError::not_found(error.to_string()),
            ExportError::InvalidRequest(_) => ApiError::bad_request(error.to_string()),
            ExportError::Database(e) => ApiError::database(e),
            ExportError::Corrupt(_)
            | ExportError::Io(_)
            | ExportError::Csv(_)
            | ExportError::Json(_) => ApiError::internal(&error),
        }
    }
}

impl From<NotificationRepoError> for ApiError {
    fn from(error: NotificationRepoError) -> Self {
        match &error {
            NotificationRepoError::NotFound(_) => ApiError::not_found(error.to_string()),
            NotificationRepoError::Database(e) => ApiError::database(e),
        }
    }
}

impl From<AuditRepoError> for ApiError {
    fn from(error: AuditRepoError) -> Self {
        match &error {
            AuditRepoError::Database(e) => ApiError::database(e),
        }
    }
}

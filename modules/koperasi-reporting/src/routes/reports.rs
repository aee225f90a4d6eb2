//! Report API Routes
//!
//! Draft CRUD, lifecycle transitions, stored-report validation and single
//! report export, all scoped to a cooperative.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::domain::report::{ReportStatus, ReportType};
use crate::repos::report_repo::{ReportFilter, ReportHeader};
use crate::services::export_service::{self, ExportFormat};
use crate::services::report_service::{
    self, CreateReportRequest, ReportDetail, UpdateReportRequest,
};
use crate::services::validation_service::{self, ValidationOutcome};
use crate::services::workflow_service::{
    self, ApproveRequest, RejectRequest, SubmitRequest, TransitionOutcome, WorkflowDeps,
};

#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    pub year: Option<i32>,
    pub report_type: Option<ReportType>,
    pub status: Option<ReportStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteReportRequest {
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

fn workflow_deps(state: &AppState) -> WorkflowDeps<'_> {
    WorkflowDeps {
        pool: &state.pool,
        cache: &state.cache,
        metrics: &state.metrics,
        thresholds: &state.config.thresholds,
    }
}

/// Handler for POST /api/cooperatives/{coop}/reports
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    Path(cooperative_id): Path<Uuid>,
    payload: Result<Json<CreateReportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReportDetail>), ApiError> {
    let Json(request) = payload?;
    let detail = report_service::create_report(&state.pool, cooperative_id, request).await?;
    state.cache.invalidate_cooperative(cooperative_id);
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Handler for GET /api/cooperatives/{coop}/reports
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Path(cooperative_id): Path<Uuid>,
    query: Result<Query<ListReportsQuery>, QueryRejection>,
) -> Result<Json<Vec<ReportHeader>>, ApiError> {
    let Query(params) = query?;
    let filter = ReportFilter {
        year: params.year,
        report_type: params.report_type,
        status: params.status,
    };
    let reports = report_service::list_reports(&state.pool, cooperative_id, &filter).await?;
    Ok(Json(reports))
}

/// Handler for GET /api/cooperatives/{coop}/reports/{id}
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path((cooperative_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ReportDetail>, ApiError> {
    let detail = report_service::get_report(&state.pool, cooperative_id, id).await?;
    Ok(Json(detail))
}

/// Handler for PUT /api/cooperatives/{coop}/reports/{id}
///
/// Only draft and rejected reports can be edited; a rejected report returns
/// to draft.
pub async fn update_report(
    State(state): State<Arc<AppState>>,
    Path((cooperative_id, id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateReportRequest>, JsonRejection>,
) -> Result<Json<ReportDetail>, ApiError> {
    let Json(request) = payload?;
    let detail = report_service::update_report(&state.pool, cooperative_id, id, request).await?;
    state.cache.invalidate_cooperative(cooperative_id);
    Ok(Json(detail))
}

/// Handler for DELETE /api/cooperatives/{coop}/reports/{id}
pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path((cooperative_id, id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<DeleteReportRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    report_service::delete_report(&state.pool, cooperative_id, id, request.actor_id).await?;
    state.cache.invalidate_cooperative(cooperative_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/cooperatives/{coop}/reports/{id}/submit
///
/// Returns 422 with the validation report when blocking errors exist.
pub async fn submit_report(
    State(state): State<Arc<AppState>>,
    Path((cooperative_id, id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let Json(request) = payload?;
    let outcome = workflow_service::submit(workflow_deps(&state), cooperative_id, id, request).await?;
    Ok(Json(outcome))
}

/// Handler for POST /api/cooperatives/{coop}/reports/{id}/approve
pub async fn approve_report(
    State(state): State<Arc<AppState>>,
    Path((cooperative_id, id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let Json(request) = payload?;
    let outcome = workflow_service::approve(workflow_deps(&state), cooperative_id, id, request).await?;
    Ok(Json(outcome))
}

/// Handler for POST /api/cooperatives/{coop}/reports/{id}/reject
pub async fn reject_report(
    State(state): State<Arc<AppState>>,
    Path((cooperative_id, id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let Json(request) = payload?;
    let outcome = workflow_service::reject(workflow_deps(&state), cooperative_id, id, request).await?;
    Ok(Json(outcome))
}

/// Handler for GET /api/cooperatives/{coop}/reports/{id}/validation
pub async fn validate_stored_report(
    State(state): State<Arc<AppState>>,
    Path((cooperative_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ValidationOutcome>, ApiError> {
    let outcome = validation_service::validate_report(
        &state.pool,
        &state.config.thresholds,
        cooperative_id,
        id,
    )
    .await?;
    state.metrics.record_validation(&outcome.validation_report);
    Ok(Json(outcome))
}

/// Handler for GET /api/cooperatives/{coop}/reports/{id}/export?format=csv|json
pub async fn export_report(
    State(state): State<Arc<AppState>>,
    Path((cooperative_id, id)): Path<(Uuid, Uuid)>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = query?;
    let format = match params.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>().map_err(ApiError::bad_request)?,
        None => ExportFormat::Csv,
    };

    let file = export_service::export_report(&state.pool, cooperative_id, id, format).await?;
    state
        .metrics
        .export_files_total
        .with_label_values(&[format.as_str()])
        .inc();

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.bytes,
    )
        .into_response())
}

//! Batch export API Routes
//!
//! Batches run to completion inside the request; the status endpoint reads
//! the batch's `status.json`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::services::export_service::{self, BatchRequest, BatchStatus};

/// Handler for POST /api/exports/batch
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchStatus>), ApiError> {
    let Json(request) = payload?;
    let format = request.format;
    let status = export_service::create_batch(&state.pool, &state.config.export_dir, request).await?;
    state
        .metrics
        .export_files_total
        .with_label_values(&[format.as_str()])
        .inc_by(status.files.len() as u64);
    Ok((StatusCode::CREATED, Json(status)))
}

/// Handler for GET /api/exports/batch/{id}
pub async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchStatus>, ApiError> {
    let status = export_service::read_status(&state.config.export_dir, id).await?;
    Ok(Json(status))
}

/// Handler for GET /api/exports/batch/{id}/files/{name}
pub async fn get_batch_file(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let file = export_service::read_batch_file(&state.config.export_dir, id, &name).await?;
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

//! Notification and audit log API Routes

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::repos::audit_repo::{self, AuditEntry};
use crate::repos::notification_repo::{self, Notification};

const DEFAULT_AUDIT_LIMIT: i64 = 100;
const MAX_AUDIT_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Handler for GET /api/users/{user}/notifications?unread_only=
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let Query(params) = query?;
    let notifications =
        notification_repo::list_for_user(&state.pool, user_id, params.unread_only).await?;
    Ok(Json(notifications))
}

/// Handler for POST /api/users/{user}/notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Notification>, ApiError> {
    let notification = notification_repo::mark_read(&state.pool, user_id, id).await?;
    Ok(Json(notification))
}

/// Handler for GET /api/cooperatives/{coop}/audit-logs?entity_id=&limit=
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    Path(cooperative_id): Path<Uuid>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let Query(params) = query?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let entries = audit_repo::list(&state.pool, cooperative_id, params.entity_id, limit).await?;
    Ok(Json(entries))
}

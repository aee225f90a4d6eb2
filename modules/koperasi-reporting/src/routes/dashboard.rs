//! Dashboard API Routes

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::analytics::YearQuery;
use super::error::ApiError;
use super::AppState;
use crate::repos::dashboard_repo::DashboardWidget;
use crate::services::dashboard_service::{
    self, CooperativeDashboard, PlatformOverview, WidgetInput,
};

#[derive(Debug, Deserialize)]
pub struct SaveWidgetsRequest {
    pub widgets: Vec<WidgetInput>,
}

/// Handler for GET /api/cooperatives/{coop}/dashboard?year=
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Path(cooperative_id): Path<Uuid>,
    query: Result<Query<YearQuery>, QueryRejection>,
) -> Result<Json<CooperativeDashboard>, ApiError> {
    let Query(params) = query?;
    let dashboard =
        dashboard_service::cooperative_dashboard(&state.pool, &state.cache, cooperative_id, params.year)
            .await?;
    Ok(Json(dashboard))
}

/// Handler for GET /api/dashboard/overview?year=
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    query: Result<Query<YearQuery>, QueryRejection>,
) -> Result<Json<PlatformOverview>, ApiError> {
    let Query(params) = query?;
    let overview = dashboard_service::platform_overview(&state.pool, &state.cache, params.year).await?;
    Ok(Json(overview))
}

/// Handler for GET /api/users/{user}/widgets
pub async fn get_widgets(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<DashboardWidget>>, ApiError> {
    let widgets = dashboard_service::get_widgets(&state.pool, user_id).await?;
    Ok(Json(widgets))
}

/// Handler for PUT /api/users/{user}/widgets
pub async fn save_widgets(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    payload: Result<Json<SaveWidgetsRequest>, JsonRejection>,
) -> Result<Json<Vec<DashboardWidget>>, ApiError> {
    let Json(request) = payload?;
    let widgets = dashboard_service::save_widgets(&state.pool, user_id, request.widgets).await?;
    Ok(Json(widgets))
}

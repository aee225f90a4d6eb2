//! Validation preview, consistency, ratio, trend and SHU API Routes

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;
use crate::domain::budget::BudgetRealization;
use crate::domain::report::ReportType;
use crate::domain::shu::{member_shares, MemberShuShare, ShuParticipant};
use crate::domain::validation::{MAX_AMOUNT, MAX_LINES};
use crate::services::analytics_service::{self, RatioResponse, TrendMetric, TrendSeries};
use crate::services::report_service::parse_content;
use crate::services::validation_service::{self, ConsistencyResponse, ValidationOutcome};

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: i32,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub metric: TrendMetric,
    pub from: i32,
    pub to: i32,
    #[serde(default)]
    pub forecast: u32,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub report_type: ReportType,
    pub content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct MemberSharesRequest {
    /// Jasa modal pool
    pub capital_pool: i64,
    /// Jasa usaha pool
    pub business_pool: i64,
    pub participants: Vec<ShuParticipant>,
}

#[derive(Debug, Serialize)]
pub struct MemberSharesResponse {
    pub capital_pool: i64,
    pub business_pool: i64,
    pub total_distributed: i64,
    pub shares: Vec<MemberShuShare>,
}

/// Handler for POST /api/validate
///
/// Validates content that has not been saved. Nothing is written.
pub async fn validate_unsaved(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidationOutcome>, ApiError> {
    let Json(request) = payload?;
    let content = parse_content(request.report_type, request.content)?;
    let outcome = validation_service::validate_content(&content, &state.config.thresholds);
    state.metrics.record_validation(&outcome.validation_report);
    Ok(Json(outcome))
}

/// Handler for GET /api/cooperatives/{coop}/consistency?year=
pub async fn get_consistency(
    State(state): State<Arc<AppState>>,
    Path(cooperative_id): Path<Uuid>,
    query: Result<Query<YearQuery>, QueryRejection>,
) -> Result<Json<ConsistencyResponse>, ApiError> {
    let Query(params) = query?;
    let response = validation_service::check_year_consistency(
        &state.pool,
        &state.config.thresholds,
        cooperative_id,
        params.year,
    )
    .await?;
    Ok(Json(response))
}

/// Handler for GET /api/cooperatives/{coop}/analytics/ratios?year=
pub async fn get_ratios(
    State(state): State<Arc<AppState>>,
    Path(cooperative_id): Path<Uuid>,
    query: Result<Query<YearQuery>, QueryRejection>,
) -> Result<Json<RatioResponse>, ApiError> {
    let Query(params) = query?;
    let response = analytics_service::ratio_analysis(&state.pool, cooperative_id, params.year).await?;
    Ok(Json(response))
}

/// Handler for GET /api/cooperatives/{coop}/analytics/trends?metric=&from=&to=&forecast=
pub async fn get_trends(
    State(state): State<Arc<AppState>>,
    Path(cooperative_id): Path<Uuid>,
    query: Result<Query<TrendQuery>, QueryRejection>,
) -> Result<Json<TrendSeries>, ApiError> {
    let Query(params) = query?;
    let series = analytics_service::trend(
        &state.pool,
        cooperative_id,
        params.metric,
        params.from,
        params.to,
        params.forecast,
        state.config.thresholds.swing_warning_pct,
    )
    .await?;
    Ok(Json(series))
}

/// Handler for GET /api/cooperatives/{coop}/analytics/budget-realization?year=
pub async fn get_budget_realization(
    State(state): State<Arc<AppState>>,
    Path(cooperative_id): Path<Uuid>,
    query: Result<Query<YearQuery>, QueryRejection>,
) -> Result<Json<BudgetRealization>, ApiError> {
    let Query(params) = query?;
    let realization =
        analytics_service::budget_realization(&state.pool, cooperative_id, params.year).await?;
    Ok(Json(realization))
}

/// Handler for POST /api/shu/member-shares
///
/// Pure calculation: splits the two member service pools across members.
pub async fn calculate_member_shares(
    payload: Result<Json<MemberSharesRequest>, JsonRejection>,
) -> Result<Json<MemberSharesResponse>, ApiError> {
    let Json(request) = payload?;
    if request.capital_pool < 0 || request.business_pool < 0 {
        return Err(ApiError::bad_request("SHU pools cannot be negative"));
    }
    if request.capital_pool > MAX_AMOUNT || request.business_pool > MAX_AMOUNT {
        return Err(ApiError::bad_request(format!(
            "SHU pools cannot exceed {}",
            MAX_AMOUNT
        )));
    }
    if request.participants.len() > MAX_LINES {
        return Err(ApiError::bad_request(format!(
            "At most {} participants are accepted",
            MAX_LINES
        )));
    }
    if let Some(p) = request
        .participants
        .iter()
        .find(|p| p.capital_basis < 0 || p.business_basis < 0)
    {
        return Err(ApiError::bad_request(format!(
            "Member {} has a negative basis",
            p.member_number
        )));
    }

    let shares = member_shares(request.capital_pool, request.business_pool, &request.participants);
    Ok(Json(MemberSharesResponse {
        capital_pool: request.capital_pool,
        business_pool: request.business_pool,
        total_distributed: shares.iter().map(|s| s.total_share).sum(),
        shares,
    }))
}

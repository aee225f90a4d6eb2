pub mod analytics;
pub mod dashboard;
pub mod error;
pub mod exports;
pub mod notifications;
pub mod reports;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::DashboardCache;
use crate::config::Config;
use crate::health::{health, ready};
use crate::metrics::Metrics;
use crate::middleware::metrics::metrics_middleware;
use crate::middleware::trace_id::trace_id_middleware;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cache: DashboardCache,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, metrics: Metrics) -> Self {
        let cache = DashboardCache::new(std::time::Duration::from_secs(
            config.dashboard_cache_ttl_secs,
        ));
        Self {
            pool,
            config,
            cache,
            metrics,
        }
    }
}

/// Handler for GET /metrics
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let coop = "/api/cooperatives/{cooperative_id}";

    Router::new()
        .route("/api/health", get(health))
        .route("/api/ready", get(ready))
        .route("/metrics", get(metrics_handler))
        // Reports
        .route(
            &format!("{coop}/reports"),
            post(reports::create_report).get(reports::list_reports),
        )
        .route(
            &format!("{coop}/reports/{{id}}"),
            get(reports::get_report)
                .put(reports::update_report)
                .delete(reports::delete_report),
        )
        .route(&format!("{coop}/reports/{{id}}/submit"), post(reports::submit_report))
        .route(&format!("{coop}/reports/{{id}}/approve"), post(reports::approve_report))
        .route(&format!("{coop}/reports/{{id}}/reject"), post(reports::reject_report))
        .route(
            &format!("{coop}/reports/{{id}}/validation"),
            get(reports::validate_stored_report),
        )
        .route(&format!("{coop}/reports/{{id}}/export"), get(reports::export_report))
        // Validation and analytics
        .route("/api/validate", post(analytics::validate_unsaved))
        .route(&format!("{coop}/consistency"), get(analytics::get_consistency))
        .route(&format!("{coop}/analytics/ratios"), get(analytics::get_ratios))
        .route(&format!("{coop}/analytics/trends"), get(analytics::get_trends))
        .route(
            &format!("{coop}/analytics/budget-realization"),
            get(analytics::get_budget_realization),
        )
        .route("/api/shu/member-shares", post(analytics::calculate_member_shares))
        // Dashboards
        .route(&format!("{coop}/dashboard"), get(dashboard::get_dashboard))
        .route("/api/dashboard/overview", get(dashboard::get_overview))
        .route(
            "/api/users/{user_id}/widgets",
            get(dashboard::get_widgets).put(dashboard::save_widgets),
        )
        // Notifications and audit
        .route(
            "/api/users/{user_id}/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/users/{user_id}/notifications/{id}/read",
            post(notifications::mark_notification_read),
        )
        .route(&format!("{coop}/audit-logs"), get(notifications::list_audit_logs))
        // Exports
        .route("/api/exports/batch", post(exports::create_batch))
        .route("/api/exports/batch/{id}", get(exports::get_batch))
        .route("/api/exports/batch/{id}/files/{name}", get(exports::get_batch_file))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(middleware::from_fn(trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

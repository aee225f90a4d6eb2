//! Dashboard Service
//!
//! Per-cooperative dashboard and the platform-wide overview, both cached in
//! the process-local `DashboardCache`, plus per-user widget layouts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::{dashboard_key, overview_key, DashboardCache};
use crate::domain::member_receivables::CollectibilityBucket;
use crate::domain::ratios::{compute_ratios, FinancialSnapshot, RatioAnalysis};
use crate::domain::report::{ReportStatus, ReportType};
use crate::repos::cooperative_repo::{self, Cooperative, CooperativeRepoError};
use crate::repos::dashboard_repo::{self, DashboardRepoError, DashboardWidget, WidgetType};
use crate::repos::report_repo::{self, ReportFilter, ReportRepoError};
use crate::services::analytics_service::{self, snapshot_from, AnalyticsError};
use crate::services::report_service::{check_year, ReportServiceError};
use crate::services::validation_service::load_report_set;

pub const MAX_WIDGETS: usize = 20;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Cooperative not found: {0}")]
    CooperativeNotFound(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ReportServiceError> for DashboardError {
    fn from(e: ReportServiceError) -> Self {
        match e {
            ReportServiceError::Database(e) => DashboardError::Database(e),
            ReportServiceError::CooperativeNotFound(id) => DashboardError::CooperativeNotFound(id),
            ReportServiceError::InvalidRequest(msg) => DashboardError::InvalidRequest(msg),
            other => DashboardError::Internal(other.to_string()),
        }
    }
}

impl From<AnalyticsError> for DashboardError {
    fn from(e: AnalyticsError) -> Self {
        match e {
            AnalyticsError::Report(e) => e.into(),
            AnalyticsError::Database(e) => DashboardError::Database(e),
            AnalyticsError::InvalidRequest(msg) => DashboardError::InvalidRequest(msg),
            other => DashboardError::Internal(other.to_string()),
        }
    }
}

impl From<CooperativeRepoError> for DashboardError {
    fn from(e: CooperativeRepoError) -> Self {
        match e {
            CooperativeRepoError::NotFound(id) => DashboardError::CooperativeNotFound(id),
            CooperativeRepoError::Database(e) => DashboardError::Database(e),
        }
    }
}

impl From<ReportRepoError> for DashboardError {
    fn from(e: ReportRepoError) -> Self {
        ReportServiceError::from(e).into()
    }
}

impl From<DashboardRepoError> for DashboardError {
    fn from(e: DashboardRepoError) -> Self {
        match e {
            DashboardRepoError::Database(e) => DashboardError::Database(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatusCell {
    pub report_type: ReportType,
    /// None when no report of this type exists for the year
    pub status: Option<ReportStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub expected: usize,
    pub present: usize,
    pub submitted: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Approved reports as a percentage of the expected set
    pub completeness_pct: f64,
}

/// One cell per report type, in `ReportType::ALL` order
pub fn status_cells(
    entries: impl IntoIterator<Item = (ReportType, ReportStatus)>,
) -> Vec<ReportStatusCell> {
    let mut cells: Vec<ReportStatusCell> = ReportType::ALL
        .iter()
        .map(|t| ReportStatusCell {
            report_type: *t,
            status: None,
        })
        .collect();
    for (report_type, status) in entries {
        if let Some(cell) = cells.iter_mut().find(|c| c.report_type == report_type) {
            cell.status = Some(status);
        }
    }
    cells
}

pub fn completeness(cells: &[ReportStatusCell]) -> Completeness {
    let count = |s: ReportStatus| cells.iter().filter(|c| c.status == Some(s)).count();
    let expected = ReportType::ALL.len();
    let approved = count(ReportStatus::Approved);

    Completeness {
        expected,
        present: cells.iter().filter(|c| c.status.is_some()).count(),
        submitted: count(ReportStatus::Submitted),
        approved,
        rejected: count(ReportStatus::Rejected),
        completeness_pct: approved as f64 / expected as f64 * 100.0,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooperativeDashboard {
    pub cooperative_id: Uuid,
    pub cooperative_code: String,
    pub cooperative_name: String,
    pub reporting_year: i32,
    pub figures: FinancialSnapshot,
    pub reports: Vec<ReportStatusCell>,
    pub completeness: Completeness,
    #[serde(flatten)]
    pub analysis: RatioAnalysis,
    /// Receivables by collectibility class; empty without a receivables register
    pub npl_breakdown: Vec<CollectibilityBucket>,
    pub generated_at: DateTime<Utc>,
}

pub async fn cooperative_dashboard(
    pool: &PgPool,
    cache: &DashboardCache,
    cooperative_id: Uuid,
    year: i32,
) -> Result<CooperativeDashboard, DashboardError> {
    check_year(year)?;
    cache
        .remember(&dashboard_key(cooperative_id, year), || {
            build_dashboard(pool, cooperative_id, year)
        })
        .await
}

async fn build_dashboard(
    pool: &PgPool,
    cooperative_id: Uuid,
    year: i32,
) -> Result<CooperativeDashboard, DashboardError> {
    let cooperative = cooperative_repo::get(pool, cooperative_id).await?;

    let headers = report_repo::list(
        pool,
        cooperative_id,
        &ReportFilter {
            year: Some(year),
            ..Default::default()
        },
    )
    .await?;
    let reports = status_cells(headers.iter().map(|h| (h.report_type, h.status)));

    let (set, _) = load_report_set(pool, cooperative_id, year).await?;
    let figures = snapshot_from(&set);
    let previous = analytics_service::load_snapshot(pool, cooperative_id, year - 1).await?;
    let analysis = compute_ratios(&figures, Some(&previous));

    let npl_breakdown = set
        .member_receivables
        .as_ref()
        .map(|r| r.summary().buckets)
        .unwrap_or_default();

    tracing::debug!(%cooperative_id, year, "Dashboard computed");

    Ok(CooperativeDashboard {
        cooperative_id,
        cooperative_code: cooperative.code,
        cooperative_name: cooperative.name,
        reporting_year: year,
        figures,
        completeness: completeness(&reports),
        reports,
        analysis,
        npl_breakdown,
        generated_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooperativeProgress {
    pub cooperative_id: Uuid,
    pub code: String,
    pub name: String,
    pub reports: Vec<ReportStatusCell>,
    pub completeness: Completeness,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformOverview {
    pub reporting_year: i32,
    pub cooperative_count: usize,
    /// Cooperatives with every report type approved
    pub fully_approved: usize,
    /// Reports across the platform waiting for review
    pub awaiting_review: usize,
    pub average_completeness_pct: Option<f64>,
    pub cooperatives: Vec<CooperativeProgress>,
}

/// Overview of active cooperatives from the year's status matrix. Matrix rows
/// of inactive cooperatives are ignored.
pub fn build_overview(
    year: i32,
    cooperatives: &[Cooperative],
    matrix: &[(Uuid, ReportType, ReportStatus)],
) -> PlatformOverview {
    let progress: Vec<CooperativeProgress> = cooperatives
        .iter()
        .map(|coop| {
            let reports = status_cells(
                matrix
                    .iter()
                    .filter(|(id, _, _)| *id == coop.id)
                    .map(|(_, t, s)| (*t, *s)),
            );
            CooperativeProgress {
                cooperative_id: coop.id,
                code: coop.code.clone(),
                name: coop.name.clone(),
                completeness: completeness(&reports),
                reports,
            }
        })
        .collect();

    let average_completeness_pct = if progress.is_empty() {
        None
    } else {
        Some(
            progress
                .iter()
                .map(|p| p.completeness.completeness_pct)
                .sum::<f64>()
                / progress.len() as f64,
        )
    };

    PlatformOverview {
        reporting_year: year,
        cooperative_count: progress.len(),
        fully_approved: progress
            .iter()
            .filter(|p| p.completeness.approved == p.completeness.expected)
            .count(),
        awaiting_review: progress.iter().map(|p| p.completeness.submitted).sum(),
        average_completeness_pct,
        cooperatives: progress,
    }
}

pub async fn platform_overview(
    pool: &PgPool,
    cache: &DashboardCache,
    year: i32,
) -> Result<PlatformOverview, DashboardError> {
    check_year(year)?;
    cache
        .remember(&overview_key(year), || async {
            let cooperatives = cooperative_repo::list_active(pool).await?;
            let matrix = report_repo::status_matrix(pool, year).await?;
            Ok::<_, DashboardError>(build_overview(year, &cooperatives, &matrix))
        })
        .await
}

/// Widget as sent by the client when saving a layout; order is position
#[derive(Debug, Clone, Deserialize)]
pub struct WidgetInput {
    pub widget_type: WidgetType,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
    #[serde(default)]
    pub is_visible: Option<bool>,
}

pub fn default_layout(user_id: Uuid) -> Vec<DashboardWidget> {
    let widgets = [
        (WidgetType::KpiCard, serde_json::json!({ "kpis": ["current_ratio", "npl_ratio", "return_on_assets"] })),
        (WidgetType::ReportStatus, serde_json::json!({})),
        (WidgetType::RatioTable, serde_json::json!({})),
        (WidgetType::TrendChart, serde_json::json!({ "metric": "total_assets", "years": 5 })),
        (WidgetType::NplBreakdown, serde_json::json!({})),
    ];
    widgets
        .into_iter()
        .enumerate()
        .map(|(i, (widget_type, settings))| DashboardWidget {
            id: Uuid::nil(),
            user_id,
            widget_type,
            position: i as i32,
            settings,
            is_visible: true,
        })
        .collect()
}

/// Turn a submitted layout into rows: fresh ids, positions 0..n in list order
pub fn normalize_layout(
    user_id: Uuid,
    inputs: Vec<WidgetInput>,
) -> Result<Vec<DashboardWidget>, DashboardError> {
    if inputs.len() > MAX_WIDGETS {
        return Err(DashboardError::InvalidRequest(format!(
            "A layout may hold at most {} widgets",
            MAX_WIDGETS
        )));
    }

    let mut widgets = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.into_iter().enumerate() {
        let settings = input.settings.unwrap_or_else(|| serde_json::json!({}));
        if !settings.is_object() {
            return Err(DashboardError::InvalidRequest(format!(
                "widgets[{}].settings must be an object",
                i
            )));
        }
        widgets.push(DashboardWidget {
            id: Uuid::new_v4(),
            user_id,
            widget_type: input.widget_type,
            position: i as i32,
            settings,
            is_visible: input.is_visible.unwrap_or(true),
        });
    }
    Ok(widgets)
}

pub async fn get_widgets(pool: &PgPool, user_id: Uuid) -> Result<Vec<DashboardWidget>, DashboardError> {
    let widgets = dashboard_repo::list_widgets(pool, user_id).await?;
    if widgets.is_empty() {
        return Ok(default_layout(user_id));
    }
    Ok(widgets)
}

pub async fn save_widgets(
    pool: &PgPool,
    user_id: Uuid,
    inputs: Vec<WidgetInput>,
) -> Result<Vec<DashboardWidget>, DashboardError> {
    let widgets = normalize_layout(user_id, inputs)?;

    let mut tx = pool.begin().await?;
    dashboard_repo::replace_widgets_tx(&mut tx, user_id, &widgets).await?;
    tx.commit().await?;

    tracing::info!(%user_id, widgets = widgets.len(), "Dashboard layout saved");
    Ok(widgets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coop(code: &str) -> Cooperative {
        Cooperative {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: format!("Koperasi {}", code),
            registration_number: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_cells_cover_every_type() {
        let cells = status_cells([
            (ReportType::CashFlow, ReportStatus::Submitted),
            (ReportType::BalanceSheet, ReportStatus::Approved),
        ]);
        assert_eq!(cells.len(), 9);
        assert_eq!(cells[0].report_type, ReportType::BalanceSheet);
        assert_eq!(cells[0].status, Some(ReportStatus::Approved));
        assert_eq!(cells[2].status, Some(ReportStatus::Submitted));
        assert_eq!(cells[8].status, None);
    }

    #[test]
    fn test_completeness_counts_only_approved() {
        let cells = status_cells([
            (ReportType::BalanceSheet, ReportStatus::Approved),
            (ReportType::IncomeStatement, ReportStatus::Approved),
            (ReportType::CashFlow, ReportStatus::Approved),
            (ReportType::EquityChanges, ReportStatus::Rejected),
            (ReportType::BudgetPlan, ReportStatus::Draft),
        ]);
        let c = completeness(&cells);
        assert_eq!(c.expected, 9);
        assert_eq!(c.present, 5);
        assert_eq!(c.approved, 3);
        assert_eq!(c.rejected, 1);
        assert!((c.completeness_pct - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_overview_aggregates() {
        let a = coop("KSP-01");
        let b = coop("KSP-02");
        let mut matrix: Vec<(Uuid, ReportType, ReportStatus)> = ReportType::ALL
            .iter()
            .map(|t| (a.id, *t, ReportStatus::Approved))
            .collect();
        matrix.push((b.id, ReportType::BalanceSheet, ReportStatus::Submitted));
        matrix.push((b.id, ReportType::CashFlow, ReportStatus::Submitted));
        // Unknown (inactive) cooperative
        matrix.push((Uuid::new_v4(), ReportType::CashFlow, ReportStatus::Submitted));

        let o = build_overview(2024, &[a, b], &matrix);
        assert_eq!(o.cooperative_count, 2);
        assert_eq!(o.fully_approved, 1);
        assert_eq!(o.awaiting_review, 2);
        assert_eq!(o.average_completeness_pct, Some(50.0));
    }

    #[test]
    fn test_empty_overview() {
        let o = build_overview(2024, &[], &[]);
        assert_eq!(o.cooperative_count, 0);
        assert_eq!(o.average_completeness_pct, None);
    }

    #[test]
    fn test_default_layout_positions() {
        let user = Uuid::new_v4();
        let layout = default_layout(user);
        assert_eq!(layout.len(), 5);
        assert!(layout.iter().enumerate().all(|(i, w)| w.position == i as i32));
        assert!(layout.iter().all(|w| w.user_id == user && w.is_visible));
    }

    #[test]
    fn test_normalize_layout_renumbers() {
        let inputs = vec![
            WidgetInput {
                widget_type: WidgetType::TrendChart,
                settings: Some(serde_json::json!({ "metric": "member_savings" })),
                is_visible: None,
            },
            WidgetInput {
                widget_type: WidgetType::KpiCard,
                settings: None,
                is_visible: Some(false),
            },
        ];
        let widgets = normalize_layout(Uuid::new_v4(), inputs).unwrap();
        assert_eq!(widgets[0].position, 0);
        assert_eq!(widgets[1].position, 1);
        assert!(widgets[0].is_visible);
        assert!(!widgets[1].is_visible);
        assert_eq!(widgets[1].settings, serde_json::json!({}));
    }

    #[test]
    fn test_normalize_layout_rejects_bad_settings() {
        let inputs = vec![WidgetInput {
            widget_type: WidgetType::KpiCard,
            settings: Some(serde_json::json!([1, 2])),
            is_visible: None,
        }];
        assert!(matches!(
            normalize_layout(Uuid::new_v4(), inputs),
            Err(DashboardError::InvalidRequest(_))
        ));

        let too_many = (0..=MAX_WIDGETS)
            .map(|_| WidgetInput {
                widget_type: WidgetType::KpiCard,
                settings: None,
                is_visible: None,
            })
            .collect();
        assert!(normalize_layout(Uuid::new_v4(), too_many).is_err());
    }
}

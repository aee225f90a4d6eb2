//! Analytics Service
//!
//! Builds a `FinancialSnapshot` from a year's reports, computes ratios and the
//! health score, persists KPI values, and produces trend series with forecasts.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::budget::{realization, BudgetRealization};
use crate::domain::consistency::ReportSet;
use crate::domain::ratios::{compute_ratios, FinancialSnapshot, RatioAnalysis};
use crate::domain::report::{Period, ReportContent, ReportType};
use crate::domain::trends::{
    average_growth, cagr, detect_swings, forecast, linear_regression, moving_average, yoy_growth,
    GrowthPoint, Regression, Swing, TrendPoint,
};
use crate::repos::dashboard_repo::{self, DashboardRepoError};
use crate::repos::line_repo;
use crate::services::report_service::{check_year, ReportServiceError};
use crate::services::validation_service::load_report_set;

/// Longest year range a trend request may span
pub const MAX_TREND_YEARS: i32 = 30;
pub const MAX_FORECAST_PERIODS: u32 = 10;
const MOVING_AVERAGE_WINDOW: usize = 3;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("No {0} report found for {1}")]
    MissingReport(ReportType, i32),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Report(#[from] ReportServiceError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DashboardRepoError> for AnalyticsError {
    fn from(e: DashboardRepoError) -> Self {
        match e {
            DashboardRepoError::Database(e) => AnalyticsError::Database(e),
        }
    }
}

impl From<line_repo::LineRepoError> for AnalyticsError {
    fn from(e: line_repo::LineRepoError) -> Self {
        AnalyticsError::Report(e.into())
    }
}

/// Gather the key figures of a year. Figures are taken from the most specific
/// report available and fall back to balance sheet roles.
pub fn snapshot_from(set: &ReportSet) -> FinancialSnapshot {
    let bs = set.balance_sheet.as_ref().map(|b| b.totals(Period::Current));
    let is = set
        .income_statement
        .as_ref()
        .map(|i| i.totals(Period::Current));
    let savings = set.member_savings.as_ref().map(|m| m.totals());
    let receivables = set.member_receivables.as_ref().map(|r| r.summary());
    let npl = set.non_performing.as_ref().map(|n| n.totals());

    FinancialSnapshot {
        total_assets: bs.map(|t| t.total_assets),
        current_assets: bs.map(|t| t.current_assets),
        current_liabilities: bs.map(|t| t.current_liabilities),
        total_liabilities: bs.map(|t| t.total_liabilities),
        total_equity: bs.map(|t| t.total_equity),
        operating_revenue: is.map(|t| t.operating_revenue),
        total_revenue: is.map(|t| t.total_revenue()),
        operating_expense: is.map(|t| t.operating_expense),
        shu_after_tax: is
            .map(|t| t.shu_after_tax)
            .or(set.shu_distribution.as_ref().map(|s| s.shu_after_tax)),
        receivables_outstanding: receivables
            .as_ref()
            .map(|r| r.total_outstanding)
            .or(bs.map(|t| t.member_receivables)),
        npl_outstanding: npl
            .map(|n| n.outstanding)
            .or(receivables.as_ref().map(|r| r.non_performing_outstanding)),
        loan_loss_provision: bs
            .map(|t| t.loan_loss_allowance)
            .filter(|a| *a > 0)
            .or(npl.map(|n| n.provision)),
        member_savings: savings.map(|s| s.total_savings).or(bs.map(|t| {
            t.principal_savings + t.mandatory_savings + t.voluntary_savings
        })),
        member_count: savings.map(|s| s.member_count),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RatioResponse {
    pub cooperative_id: Uuid,
    pub reporting_year: i32,
    pub snapshot: FinancialSnapshot,
    #[serde(flatten)]
    pub analysis: RatioAnalysis,
}

pub async fn load_snapshot(
    pool: &PgPool,
    cooperative_id: Uuid,
    year: i32,
) -> Result<FinancialSnapshot, AnalyticsError> {
    let (set, _) = load_report_set(pool, cooperative_id, year).await?;
    Ok(snapshot_from(&set))
}

pub async fn ratio_analysis(
    pool: &PgPool,
    cooperative_id: Uuid,
    year: i32,
) -> Result<RatioResponse, AnalyticsError> {
    check_year(year)?;
    let snapshot = load_snapshot(pool, cooperative_id, year).await?;
    let previous = load_snapshot(pool, cooperative_id, year - 1).await?;
    let analysis = compute_ratios(&snapshot, Some(&previous));

    Ok(RatioResponse {
        cooperative_id,
        reporting_year: year,
        snapshot,
        analysis,
    })
}

/// Recompute and persist the KPI values of a year
pub async fn refresh_kpis(
    pool: &PgPool,
    cooperative_id: Uuid,
    year: i32,
) -> Result<RatioAnalysis, AnalyticsError> {
    let response = ratio_analysis(pool, cooperative_id, year).await?;

    let mut tx = pool.begin().await?;
    dashboard_repo::upsert_kpis_tx(&mut tx, cooperative_id, year, &response.analysis.kpis).await?;
    tx.commit().await?;

    tracing::info!(
        %cooperative_id,
        year,
        kpis = response.analysis.kpis.len(),
        health = ?response.analysis.health.as_ref().map(|h| h.rating),
        "KPI metrics refreshed"
    );

    Ok(response.analysis)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    TotalAssets,
    TotalLiabilities,
    TotalEquity,
    TotalRevenue,
    OperatingExpense,
    ShuAfterTax,
    MemberSavings,
    ReceivablesOutstanding,
    NplOutstanding,
    MemberCount,
}

impl TrendMetric {
    pub fn value(&self, s: &FinancialSnapshot) -> Option<f64> {
        let v = match self {
            TrendMetric::TotalAssets => s.total_assets,
            TrendMetric::TotalLiabilities => s.total_liabilities,
            TrendMetric::TotalEquity => s.total_equity,
            TrendMetric::TotalRevenue => s.total_revenue,
            TrendMetric::OperatingExpense => s.operating_expense,
            TrendMetric::ShuAfterTax => s.shu_after_tax,
            TrendMetric::MemberSavings => s.member_savings,
            TrendMetric::ReceivablesOutstanding => s.receivables_outstanding,
            TrendMetric::NplOutstanding => s.npl_outstanding,
            TrendMetric::MemberCount => s.member_count,
        };
        v.map(|v| v as f64)
    }
}

impl FromStr for TrendMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("Unknown trend metric: {}", s))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendSeries {
    pub metric: TrendMetric,
    pub points: Vec<GrowthPoint>,
    /// Years in the range without data for the metric
    pub missing_years: Vec<i32>,
    pub average_growth_pct: Option<f64>,
    pub cagr_pct: Option<f64>,
    pub moving_average: Vec<Option<f64>>,
    pub regression: Option<Regression>,
    pub forecast: Vec<TrendPoint>,
    pub swings: Vec<Swing>,
}

/// Assemble a trend series from per-year snapshots sorted by year
pub fn build_trend(
    metric: TrendMetric,
    snapshots: &[(i32, FinancialSnapshot)],
    forecast_periods: u32,
    swing_pct: f64,
) -> TrendSeries {
    let mut points = Vec::new();
    let mut missing_years = Vec::new();
    for (year, snapshot) in snapshots {
        match metric.value(snapshot) {
            Some(v) => points.push(TrendPoint::new(*year, v)),
            None => missing_years.push(*year),
        }
    }

    TrendSeries {
        metric,
        points: yoy_growth(&points),
        missing_years,
        average_growth_pct: average_growth(&points),
        cagr_pct: cagr(&points),
        moving_average: moving_average(&points, MOVING_AVERAGE_WINDOW),
        regression: linear_regression(&points),
        forecast: forecast(&points, forecast_periods),
        swings: detect_swings(&points, swing_pct),
    }
}

pub async fn trend(
    pool: &PgPool,
    cooperative_id: Uuid,
    metric: TrendMetric,
    from_year: i32,
    to_year: i32,
    forecast_periods: u32,
    swing_pct: f64,
) -> Result<TrendSeries, AnalyticsError> {
    check_year(from_year)?;
    check_year(to_year)?;
    if from_year > to_year {
        return Err(AnalyticsError::InvalidRequest(format!(
            "from ({}) must not be after to ({})",
            from_year, to_year
        )));
    }
    if to_year - from_year >= MAX_TREND_YEARS {
        return Err(AnalyticsError::InvalidRequest(format!(
            "A trend may span at most {} years",
            MAX_TREND_YEARS
        )));
    }
    if forecast_periods > MAX_FORECAST_PERIODS {
        return Err(AnalyticsError::InvalidRequest(format!(
            "forecast must be at most {}",
            MAX_FORECAST_PERIODS
        )));
    }

    let mut snapshots = Vec::new();
    for year in from_year..=to_year {
        snapshots.push((year, load_snapshot(pool, cooperative_id, year).await?));
    }

    Ok(build_trend(metric, &snapshots, forecast_periods, swing_pct))
}

/// Budget plan of a year against that year's income statement
pub async fn budget_realization(
    pool: &PgPool,
    cooperative_id: Uuid,
    year: i32,
) -> Result<BudgetRealization, AnalyticsError> {
    check_year(year)?;
    let (set, headers) = load_report_set(pool, cooperative_id, year).await?;

    let budget_header = headers
        .iter()
        .find(|h| h.report_type == ReportType::BudgetPlan)
        .ok_or(AnalyticsError::MissingReport(ReportType::BudgetPlan, year))?;
    let plan = match line_repo::load_content(pool, budget_header).await? {
        ReportContent::BudgetPlan(plan) => plan,
        _ => return Err(AnalyticsError::MissingReport(ReportType::BudgetPlan, year)),
    };

    let actual = set
        .income_statement
        .as_ref()
        .ok_or(AnalyticsError::MissingReport(ReportType::IncomeStatement, year))?
        .totals(Period::Current);

    Ok(realization(&plan, &actual, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{balance_sheet, income_statement, member_receivables, member_savings, non_performing};

    fn full_set() -> ReportSet {
        ReportSet {
            balance_sheet: Some(balance_sheet::tests::balanced_sheet()),
            income_statement: Some(income_statement::tests::statement()),
            member_savings: Some(member_savings::tests::register()),
            member_receivables: Some(member_receivables::tests::register()),
            non_performing: Some(non_performing::tests::report()),
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshot_from_full_set() {
        let s = snapshot_from(&full_set());
        assert_eq!(s.total_assets, Some(200_000));
        assert_eq!(s.total_equity, Some(100_000));
        assert_eq!(s.shu_after_tax, Some(126_000));
        assert_eq!(s.receivables_outstanding, Some(100_000));
        assert_eq!(s.npl_outstanding, Some(60_000));
        assert_eq!(s.loan_loss_provision, Some(5_000));
        assert_eq!(s.member_savings, Some(170_000));
        assert_eq!(s.member_count, Some(3));
    }

    #[test]
    fn test_snapshot_falls_back_to_balance_sheet_roles() {
        let set = ReportSet {
            balance_sheet: Some(balance_sheet::tests::balanced_sheet()),
            ..Default::default()
        };
        let s = snapshot_from(&set);
        assert_eq!(s.receivables_outstanding, Some(100_000));
        assert_eq!(s.member_savings, Some(170_000));
        assert_eq!(s.npl_outstanding, None);
        assert_eq!(s.member_count, None);
        assert_eq!(s.total_revenue, None);
    }

    #[test]
    fn test_empty_year_has_no_figures() {
        assert_eq!(snapshot_from(&ReportSet::default()), FinancialSnapshot::default());
    }

    #[test]
    fn test_build_trend_skips_missing_years() {
        let with_assets = |v: i64| FinancialSnapshot {
            total_assets: Some(v),
            ..Default::default()
        };
        let snapshots = vec![
            (2020, with_assets(100)),
            (2021, FinancialSnapshot::default()),
            (2022, with_assets(121)),
            (2023, with_assets(300)),
        ];
        let t = build_trend(TrendMetric::TotalAssets, &snapshots, 2, 50.0);
        assert_eq!(t.points.len(), 3);
        assert_eq!(t.missing_years, vec![2021]);
        // 2020 -> 2022 spans two years and is not a year-over-year figure
        assert_eq!(t.points[1].growth_pct, None);
        let growth_2023 = (300.0 - 121.0) / 121.0 * 100.0;
        assert!((t.points[2].growth_pct.unwrap() - growth_2023).abs() < 1e-9);
        assert!((t.average_growth_pct.unwrap() - growth_2023).abs() < 1e-9);
        assert_eq!(t.forecast.len(), 2);
        assert_eq!(t.forecast[0].year, 2024);
        assert_eq!(t.swings.len(), 1);
        assert_eq!(t.swings[0].year, 2023);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("shu_after_tax".parse::<TrendMetric>(), Ok(TrendMetric::ShuAfterTax));
        assert!("profit".parse::<TrendMetric>().is_err());
    }
}

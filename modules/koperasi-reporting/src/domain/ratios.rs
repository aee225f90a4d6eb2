//! Financial ratios, KPI health ratings, and the overall health score
//!
//! Ratios that would divide by zero are reported with `value: None` rather
//! than NaN or infinity, and are left out of the health score.

use serde::{Deserialize, Serialize};

use crate::domain::non_performing::npl_ratio;

/// Figures of one reporting year gathered from the individual statements.
/// Any figure whose source report is missing stays `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FinancialSnapshot {
    pub total_assets: Option<i64>,
    pub current_assets: Option<i64>,
    pub current_liabilities: Option<i64>,
    pub total_liabilities: Option<i64>,
    pub total_equity: Option<i64>,
    pub operating_revenue: Option<i64>,
    pub total_revenue: Option<i64>,
    pub operating_expense: Option<i64>,
    pub shu_after_tax: Option<i64>,
    pub receivables_outstanding: Option<i64>,
    pub npl_outstanding: Option<i64>,
    pub loan_loss_provision: Option<i64>,
    pub member_savings: Option<i64>,
    pub member_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "health_rating", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HealthRating {
    Healthy,
    FairlyHealthy,
    LessHealthy,
    Unhealthy,
}

impl HealthRating {
    pub fn score(&self) -> f64 {
        match self {
            HealthRating::Healthy => 100.0,
            HealthRating::FairlyHealthy => 75.0,
            HealthRating::LessHealthy => 50.0,
            HealthRating::Unhealthy => 25.0,
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score >= 87.5 {
            HealthRating::Healthy
        } else if score >= 62.5 {
            HealthRating::FairlyHealthy
        } else if score >= 37.5 {
            HealthRating::LessHealthy
        } else {
            HealthRating::Unhealthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthRating::Healthy => "healthy",
            HealthRating::FairlyHealthy => "fairly_healthy",
            HealthRating::LessHealthy => "less_healthy",
            HealthRating::Unhealthy => "unhealthy",
        }
    }
}

/// Rating bands: three cut-offs separating the four ratings
#[derive(Debug, Clone, Copy)]
enum Bands {
    /// value >= a → healthy, >= b → fairly, >= c → less, else unhealthy
    HigherIsBetter(f64, f64, f64),
    /// value <= a → healthy, <= b → fairly, <= c → less, else unhealthy
    LowerIsBetter(f64, f64, f64),
}

impl Bands {
    fn rate(&self, value: f64) -> HealthRating {
        match *self {
            Bands::HigherIsBetter(a, b, c) => {
                if value >= a {
                    HealthRating::Healthy
                } else if value >= b {
                    HealthRating::FairlyHealthy
                } else if value >= c {
                    HealthRating::LessHealthy
                } else {
                    HealthRating::Unhealthy
                }
            }
            Bands::LowerIsBetter(a, b, c) => {
                if value <= a {
                    HealthRating::Healthy
                } else if value <= b {
                    HealthRating::FairlyHealthy
                } else if value <= c {
                    HealthRating::LessHealthy
                } else {
                    HealthRating::Unhealthy
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiUnit {
    Ratio,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub code: String,
    pub name: String,
    pub unit: KpiUnit,
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<HealthRating>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: f64,
    pub rating: HealthRating,
    pub rated_kpis: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioAnalysis {
    pub kpis: Vec<Kpi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthScore>,
}

impl RatioAnalysis {
    pub fn kpi(&self, code: &str) -> Option<&Kpi> {
        self.kpis.iter().find(|k| k.code == code)
    }
}

fn divide(numerator: Option<i64>, denominator: Option<i64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0 => Some(n as f64 / d as f64),
        _ => None,
    }
}

/// Growth from previous to current as a percentage
fn growth(current: Option<i64>, previous: Option<i64>) -> Option<f64> {
    match (current, previous) {
        (Some(c), Some(p)) if p != 0 => Some((c as f64 - p as f64) / (p as f64).abs() * 100.0),
        _ => None,
    }
}

fn percent(ratio: Option<f64>) -> Option<f64> {
    ratio.map(|r| r * 100.0)
}

fn kpi(code: &str, name: &str, unit: KpiUnit, value: Option<f64>, bands: Option<Bands>) -> Kpi {
    let rating = match (value, bands) {
        (Some(v), Some(b)) if v.is_finite() => Some(b.rate(v)),
        _ => None,
    };
    Kpi {
        code: code.to_string(),
        name: name.to_string(),
        unit,
        value: value.filter(|v| v.is_finite()),
        rating,
    }
}

/// Compute every KPI for `current`, using `previous` for growth figures
pub fn compute_ratios(current: &FinancialSnapshot, previous: Option<&FinancialSnapshot>) -> RatioAnalysis {
    use Bands::*;
    use KpiUnit::*;

    let c = current;
    let prev = previous.copied().unwrap_or_default();

    let kpis = vec![
        kpi(
            "current_ratio",
            "Current ratio",
            Ratio,
            divide(c.current_assets, c.current_liabilities),
            Some(HigherIsBetter(1.5, 1.25, 1.0)),
        ),
        kpi(
            "debt_to_equity",
            "Debt to equity",
            Ratio,
            divide(c.total_liabilities, c.total_equity),
            Some(LowerIsBetter(1.0, 1.5, 2.0)),
        ),
        kpi(
            "debt_to_assets",
            "Debt to assets",
            Percent,
            percent(divide(c.total_liabilities, c.total_assets)),
            Some(LowerIsBetter(50.0, 60.0, 70.0)),
        ),
        kpi(
            "equity_ratio",
            "Equity to assets",
            Percent,
            percent(divide(c.total_equity, c.total_assets)),
            Some(HigherIsBetter(30.0, 20.0, 10.0)),
        ),
        kpi(
            "return_on_assets",
            "Return on assets",
            Percent,
            percent(divide(c.shu_after_tax, c.total_assets)),
            Some(HigherIsBetter(5.0, 3.0, 1.0)),
        ),
        kpi(
            "return_on_equity",
            "Return on equity",
            Percent,
            percent(divide(c.shu_after_tax, c.total_equity)),
            Some(HigherIsBetter(15.0, 10.0, 5.0)),
        ),
        kpi(
            "net_margin",
            "Net SHU margin",
            Percent,
            percent(divide(c.shu_after_tax, c.total_revenue)),
            Some(HigherIsBetter(10.0, 5.0, 1.0)),
        ),
        kpi(
            "operating_expense_ratio",
            "Operating expense to operating revenue",
            Percent,
            percent(divide(c.operating_expense, c.operating_revenue)),
            Some(LowerIsBetter(80.0, 90.0, 100.0)),
        ),
        kpi(
            "npl_ratio",
            "Non-performing receivables",
            Percent,
            percent(match (c.npl_outstanding, c.receivables_outstanding) {
                (Some(npl), Some(total)) => npl_ratio(npl, total),
                _ => None,
            }),
            Some(LowerIsBetter(5.0, 10.0, 15.0)),
        ),
        kpi(
            "provision_coverage",
            "Provision coverage of non-performing receivables",
            Percent,
            percent(divide(c.loan_loss_provision, c.npl_outstanding)),
            Some(HigherIsBetter(100.0, 75.0, 50.0)),
        ),
        kpi(
            "loan_to_savings",
            "Receivables to member savings",
            Percent,
            percent(divide(c.receivables_outstanding, c.member_savings)),
            None,
        ),
        kpi("asset_growth", "Asset growth", Percent, growth(c.total_assets, prev.total_assets), None),
        kpi(
            "revenue_growth",
            "Revenue growth",
            Percent,
            growth(c.total_revenue, prev.total_revenue),
            None,
        ),
        kpi("shu_growth", "SHU growth", Percent, growth(c.shu_after_tax, prev.shu_after_tax), None),
        kpi(
            "member_growth",
            "Member growth",
            Percent,
            growth(c.member_count, prev.member_count),
            None,
        ),
    ];

    let health = health_score(&kpis);
    RatioAnalysis { kpis, health }
}

/// Mean score of all rated KPIs, None when nothing could be rated
pub fn health_score(kpis: &[Kpi]) -> Option<HealthScore> {
    let rated: Vec<f64> = kpis
        .iter()
        .filter_map(|k| k.rating.map(|r| r.score()))
        .collect();
    if rated.is_empty() {
        return None;
    }
    let score = rated.iter().sum::<f64>() / rated.len() as f64;
    Some(HealthScore {
        score,
        rating: HealthRating::from_score(score),
        rated_kpis: rated.len(),
    })
}

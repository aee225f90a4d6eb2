//! Dashboard widget layouts and persisted KPI values

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::ratios::Kpi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "widget_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WidgetType {
    KpiCard,
    TrendChart,
    RatioTable,
    ReportStatus,
    NplBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DashboardWidget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub widget_type: WidgetType,
    pub position: i32,
    pub settings: serde_json::Value,
    pub is_visible: bool,
}

#[derive(Debug, Error)]
pub enum DashboardRepoError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn list_widgets(pool: &PgPool, user_id: Uuid) -> Result<Vec<DashboardWidget>, DashboardRepoError> {
    let widgets = sqlx::query_as::<_, DashboardWidget>(
        r#"
        SELECT id, user_id, widget_type, position, settings, is_visible
        FROM dashboard_widgets
        WHERE user_id = $1
        ORDER BY position
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(widgets)
}

/// Replace a user's whole layout
pub async fn replace_widgets_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    widgets: &[DashboardWidget],
) -> Result<(), DashboardRepoError> {
    sqlx::query("DELETE FROM dashboard_widgets WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    for w in widgets {
        sqlx::query(
            r#"
            INSERT INTO dashboard_widgets (id, user_id, widget_type, position, settings, is_visible)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(w.id)
        .bind(user_id)
        .bind(w.widget_type)
        .bind(w.position)
        .bind(&w.settings)
        .bind(w.is_visible)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Insert or refresh KPI values for a cooperative and year
pub async fn upsert_kpis_tx(
    tx: &mut Transaction<'_, Postgres>,
    cooperative_id: Uuid,
    reporting_year: i32,
    kpis: &[Kpi],
) -> Result<(), DashboardRepoError> {
    for kpi in kpis {
        sqlx::query(
            r#"
            INSERT INTO kpi_metrics (cooperative_id, reporting_year, code, value, rating, computed_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (cooperative_id, reporting_year, code)
            DO UPDATE SET value = EXCLUDED.value,
                          rating = EXCLUDED.rating,
                          computed_at = EXCLUDED.computed_at
            "#,
        )
        .bind(cooperative_id)
        .bind(reporting_year)
        .bind(&kpi.code)
        .bind(kpi.value)
        .bind(kpi.rating)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

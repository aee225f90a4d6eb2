//! Repository for financial report headers
//!
//! Columns: financial_reports(id, cooperative_id, report_type, reporting_year,
//! status, data, created_by, submitted_at, reviewed_by, reviewed_at,
//! rejection_reason, created_at, updated_at), unique on
//! (cooperative_id, report_type, reporting_year).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::report::{ReportStatus, ReportType};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReportHeader {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub report_type: ReportType,
    pub reporting_year: i32,
    pub status: ReportStatus,
    pub data: serde_json::Value,
    pub created_by: Uuid,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ReportRepoError {
    #[error("A {report_type} report for {year} already exists")]
    Duplicate { report_type: ReportType, year: i32 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub year: Option<i32>,
    pub report_type: Option<ReportType>,
    pub status: Option<ReportStatus>,
}

const HEADER_COLUMNS: &str = "id, cooperative_id, report_type, reporting_year, status, data, \
     created_by, submitted_at, reviewed_by, reviewed_at, rejection_reason, created_at, updated_at";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    cooperative_id: Uuid,
    report_type: ReportType,
    reporting_year: i32,
    data: &serde_json::Value,
    created_by: Uuid,
) -> Result<ReportHeader, ReportRepoError> {
    let sql = format!(
        r#"
        INSERT INTO financial_reports
            (id, cooperative_id, report_type, reporting_year, status, data, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'draft', $5, $6, NOW(), NOW())
        RETURNING {HEADER_COLUMNS}
        "#
    );

    sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(Uuid::new_v4())
        .bind(cooperative_id)
        .bind(report_type)
        .bind(reporting_year)
        .bind(data)
        .bind(created_by)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReportRepoError::Duplicate {
                    report_type,
                    year: reporting_year,
                }
            } else {
                ReportRepoError::Database(e)
            }
        })
}

pub async fn find_by_id(
    pool: &PgPool,
    cooperative_id: Uuid,
    id: Uuid,
) -> Result<Option<ReportHeader>, ReportRepoError> {
    let sql = format!(
        "SELECT {HEADER_COLUMNS} FROM financial_reports WHERE id = $1 AND cooperative_id = $2"
    );
    let header = sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(id)
        .bind(cooperative_id)
        .fetch_optional(pool)
        .await?;

    Ok(header)
}

/// Lookup by id alone, used by batch export where the request names report ids only
pub async fn find_any_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ReportHeader>, ReportRepoError> {
    let sql = format!("SELECT {HEADER_COLUMNS} FROM financial_reports WHERE id = $1");
    let header = sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(header)
}

/// Lock the header row for a lifecycle transition
pub async fn find_for_update_tx(
    tx: &mut Transaction<'_, Postgres>,
    cooperative_id: Uuid,
    id: Uuid,
) -> Result<Option<ReportHeader>, ReportRepoError> {
    let sql = format!(
        "SELECT {HEADER_COLUMNS} FROM financial_reports WHERE id = $1 AND cooperative_id = $2 FOR UPDATE"
    );
    let header = sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(id)
        .bind(cooperative_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(header)
}

pub async fn list(
    pool: &PgPool,
    cooperative_id: Uuid,
    filter: &ReportFilter,
) -> Result<Vec<ReportHeader>, ReportRepoError> {
    let sql = format!(
        r#"
        SELECT {HEADER_COLUMNS}
        FROM financial_reports
        WHERE cooperative_id = $1
          AND ($2::int IS NULL OR reporting_year = $2)
          AND ($3::report_type IS NULL OR report_type = $3)
          AND ($4::report_status IS NULL OR status = $4)
        ORDER BY reporting_year DESC, report_type
        "#
    );
    let headers = sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(cooperative_id)
        .bind(filter.year)
        .bind(filter.report_type)
        .bind(filter.status)
        .fetch_all(pool)
        .await?;

    Ok(headers)
}

/// Non-rejected reports of a cooperative for one year, one per type
pub async fn list_for_year(
    pool: &PgPool,
    cooperative_id: Uuid,
    year: i32,
) -> Result<Vec<ReportHeader>, ReportRepoError> {
    let sql = format!(
        r#"
        SELECT {HEADER_COLUMNS}
        FROM financial_reports
        WHERE cooperative_id = $1
          AND reporting_year = $2
          AND status <> 'rejected'
        ORDER BY report_type
        "#
    );
    let headers = sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(cooperative_id)
        .bind(year)
        .fetch_all(pool)
        .await?;

    Ok(headers)
}

/// (cooperative_id, report_type, status) for every report of a year, across all cooperatives
pub async fn status_matrix(
    pool: &PgPool,
    year: i32,
) -> Result<Vec<(Uuid, ReportType, ReportStatus)>, ReportRepoError> {
    let rows = sqlx::query_as::<_, (Uuid, ReportType, ReportStatus)>(
        r#"
        SELECT cooperative_id, report_type, status
        FROM financial_reports
        WHERE reporting_year = $1
        "#,
    )
    .bind(year)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Replace the header data after a content edit; always leaves the report in draft
pub async fn update_content_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    data: &serde_json::Value,
) -> Result<ReportHeader, ReportRepoError> {
    let sql = format!(
        r#"
        UPDATE financial_reports
        SET data = $2,
            status = 'draft',
            rejection_reason = NULL,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {HEADER_COLUMNS}
        "#
    );
    let header = sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(id)
        .bind(data)
        .fetch_one(&mut **tx)
        .await?;

    Ok(header)
}

pub async fn mark_submitted_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<ReportHeader, ReportRepoError> {
    let sql = format!(
        r#"
        UPDATE financial_reports
        SET status = 'submitted',
            submitted_at = NOW(),
            reviewed_by = NULL,
            reviewed_at = NULL,
            rejection_reason = NULL,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {HEADER_COLUMNS}
        "#
    );
    let header = sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

    Ok(header)
}

/// Record an approve or reject decision
pub async fn mark_reviewed_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    status: ReportStatus,
    reviewer: Uuid,
    rejection_reason: Option<&str>,
) -> Result<ReportHeader, ReportRepoError> {
    let sql = format!(
        r#"
        UPDATE financial_reports
        SET status = $2,
            reviewed_by = $3,
            reviewed_at = NOW(),
            rejection_reason = $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {HEADER_COLUMNS}
        "#
    );
    let header = sqlx::query_as::<_, ReportHeader>(&sql)
        .bind(id)
        .bind(status)
        .bind(reviewer)
        .bind(rejection_reason)
        .fetch_one(&mut **tx)
        .await?;

    Ok(header)
}

/// Delete a header row; lines are removed first through `line_repo::delete_lines_tx`
pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), ReportRepoError> {
    sqlx::query("DELETE FROM financial_reports WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_error_display() {
        let err = ReportRepoError::Duplicate {
            report_type: ReportType::BalanceSheet,
            year: 2024,
        };
        assert_eq!(err.to_string(), "A balance_sheet report for 2024 already exists");
    }
}

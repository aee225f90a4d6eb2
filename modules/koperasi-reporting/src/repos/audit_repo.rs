//! Append-only audit trail of report changes

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub cooperative_id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Audit row to be written alongside a change
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    pub cooperative_id: Uuid,
    pub actor_id: Uuid,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum AuditRepoError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    entry: NewAuditEntry<'_>,
) -> Result<Uuid, AuditRepoError> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs
            (id, cooperative_id, actor_id, action, entity_type, entity_id, old_values, new_values, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        "#,
    )
    .bind(id)
    .bind(entry.cooperative_id)
    .bind(entry.actor_id)
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(entry.old_values)
    .bind(entry.new_values)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

/// Most recent entries first
pub async fn list(
    pool: &PgPool,
    cooperative_id: Uuid,
    entity_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<AuditEntry>, AuditRepoError> {
    let entries = sqlx::query_as::<_, AuditEntry>(
        r#"
        SELECT id, cooperative_id, actor_id, action, entity_type, entity_id,
               old_values, new_values, created_at
        FROM audit_logs
        WHERE cooperative_id = $1
          AND ($2::uuid IS NULL OR entity_id = $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(cooperative_id)
    .bind(entity_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

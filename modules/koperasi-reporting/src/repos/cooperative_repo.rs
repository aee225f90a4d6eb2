//! Cooperatives (tenants) and the users that receive notifications

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cooperative {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub registration_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    CooperativeUser,
}

#[derive(Debug, Error)]
pub enum CooperativeRepoError {
    #[error("Cooperative not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Cooperative>, CooperativeRepoError> {
    let coop = sqlx::query_as::<_, Cooperative>(
        r#"
        SELECT id, code, name, registration_number, is_active, created_at
        FROM cooperatives
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(coop)
}

/// Fetch a cooperative or fail with `NotFound`
pub async fn get(pool: &PgPool, id: Uuid) -> Result<Cooperative, CooperativeRepoError> {
    find_by_id(pool, id)
        .await?
        .ok_or(CooperativeRepoError::NotFound(id))
}

pub async fn list_active(pool: &PgPool) -> Result<Vec<Cooperative>, CooperativeRepoError> {
    let coops = sqlx::query_as::<_, Cooperative>(
        r#"
        SELECT id, code, name, registration_number, is_active, created_at
        FROM cooperatives
        WHERE is_active = TRUE
        ORDER BY code
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(coops)
}

/// Users with the given role; cooperative users are limited to one cooperative
pub async fn user_ids_by_role_tx(
    tx: &mut Transaction<'_, Postgres>,
    role: UserRole,
    cooperative_id: Option<Uuid>,
) -> Result<Vec<Uuid>, CooperativeRepoError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id
        FROM users
        WHERE role = $1
          AND ($2::uuid IS NULL OR cooperative_id = $2)
        ORDER BY id
        "#,
    )
    .bind(role)
    .bind(cooperative_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(ids)
}

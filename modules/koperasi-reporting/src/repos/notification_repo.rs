//! In-app notifications about report lifecycle events

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cooperative_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub report_id: Option<Uuid>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Notification content fanned out to several recipients
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub cooperative_id: Option<Uuid>,
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub report_id: Option<Uuid>,
}

#[derive(Debug, Error)]
pub enum NotificationRepoError {
    #[error("Notification not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Insert one notification per recipient; returns how many were written
pub async fn insert_for_users_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_ids: &[Uuid],
    notification: &NewNotification,
) -> Result<usize, NotificationRepoError> {
    for user_id in user_ids {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, cooperative_id, kind, title, message, report_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(notification.cooperative_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.report_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(user_ids.len())
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    unread_only: bool,
) -> Result<Vec<Notification>, NotificationRepoError> {
    let rows = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, cooperative_id, kind, title, message, report_id, read_at, created_at
        FROM notifications
        WHERE user_id = $1
          AND (NOT $2 OR read_at IS NULL)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Mark as read; already-read notifications keep their original timestamp
pub async fn mark_read(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Notification, NotificationRepoError> {
    sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications
        SET read_at = COALESCE(read_at, NOW())
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, cooperative_id, kind, title, message, report_id, read_at, created_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(NotificationRepoError::NotFound(id))
}

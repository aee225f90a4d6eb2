//! Database fixtures for service-level integration tests
//!
//! These tests need a real Postgres and only run when `DATABASE_URL` is set;
//! without it each test returns early. The schema in `tests/fixtures/schema.sql`
//! is idempotent and applied on every connect.

use koperasi_reporting::cache::DashboardCache;
use koperasi_reporting::db::init_pool;
use koperasi_reporting::domain::validation::Thresholds;
use koperasi_reporting::metrics::Metrics;
use koperasi_reporting::repos::cooperative_repo::UserRole;
use koperasi_reporting::services::workflow_service::WorkflowDeps;
use serde_json::json;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../fixtures/schema.sql");

/// Connect and apply the test schema, or None when no database is configured
pub async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let pool = init_pool(&database_url)
        .await
        .expect("Failed to create test pool");
    sqlx::raw_sql(SCHEMA)
        .execute(&pool)
        .await
        .expect("Failed to apply test schema");

    Some(pool)
}

/// Everything a workflow transition borrows
pub struct Harness {
    pub pool: PgPool,
    pub cache: DashboardCache,
    pub metrics: Metrics,
    pub thresholds: Thresholds,
}

impl Harness {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: DashboardCache::new(Duration::from_secs(60)),
            metrics: Metrics::new().expect("Failed to build metrics"),
            thresholds: Thresholds::default(),
        }
    }

    pub fn deps(&self) -> WorkflowDeps<'_> {
        WorkflowDeps {
            pool: &self.pool,
            cache: &self.cache,
            metrics: &self.metrics,
            thresholds: &self.thresholds,
        }
    }
}

pub async fn insert_cooperative(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    let code = format!("KSP-{}", &id.simple().to_string()[..8]);

    sqlx::query(
        r#"
        INSERT INTO cooperatives (id, code, name, registration_number, is_active, created_at)
        VALUES ($1, $2, $3, NULL, TRUE, NOW())
        "#,
    )
    .bind(id)
    .bind(&code)
    .bind(format!("Koperasi {}", code))
    .execute(pool)
    .await
    .expect("Failed to insert test cooperative");

    id
}

pub async fn insert_user(pool: &PgPool, cooperative_id: Option<Uuid>, role: UserRole) -> Uuid {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO users (id, cooperative_id, name, email, role, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        "#,
    )
    .bind(id)
    .bind(cooperative_id)
    .bind("Test User")
    .bind(format!("{}@koperasi.test", id))
    .bind(role)
    .execute(pool)
    .await
    .expect("Failed to insert test user");

    id
}

/// Remove a cooperative with its reports, users, audit rows and notifications
pub async fn cleanup_cooperative(pool: &PgPool, cooperative_id: Uuid) {
    sqlx::query("DELETE FROM notifications WHERE cooperative_id = $1")
        .bind(cooperative_id)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM audit_logs WHERE cooperative_id = $1")
        .bind(cooperative_id)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM cooperatives WHERE id = $1")
        .bind(cooperative_id)
        .execute(pool)
        .await
        .ok();
}

pub async fn cleanup_user(pool: &PgPool, user_id: Uuid) {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .ok();
}

pub async fn cleanup_widgets(pool: &PgPool, user_id: Uuid) {
    sqlx::query("DELETE FROM dashboard_widgets WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .ok();
}

pub async fn count_audit_rows(pool: &PgPool, report_id: Uuid, action: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE entity_id = $1 AND action = $2")
        .bind(report_id)
        .bind(action)
        .fetch_one(pool)
        .await
        .expect("Failed to count audit rows")
}

/// Notification kinds a user has received about a report, oldest first
pub async fn notification_kinds(pool: &PgPool, user_id: Uuid, report_id: Uuid) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT kind FROM notifications WHERE user_id = $1 AND report_id = $2 ORDER BY created_at",
    )
    .bind(user_id)
    .bind(report_id)
    .fetch_all(pool)
    .await
    .expect("Failed to list notifications")
}

/// Balanced two-line balance sheet body
pub fn balanced_sheet(amount: i64) -> serde_json::Value {
    json!({
        "lines": [
            { "account_code": "1-110", "account_name": "Kas", "category": "current_asset", "role": "cash", "current_amount": amount },
            { "account_code": "3-110", "account_name": "Simpanan Pokok", "category": "equity", "role": "principal_savings", "current_amount": amount }
        ]
    })
}

/// Assets exceed equity, which blocks submission
pub fn unbalanced_sheet() -> serde_json::Value {
    json!({
        "lines": [
            { "account_code": "1-110", "account_name": "Kas", "category": "current_asset", "role": "cash", "current_amount": 500000 },
            { "account_code": "3-110", "account_name": "Simpanan Pokok", "category": "equity", "role": "principal_savings", "current_amount": 100000 }
        ]
    })
}

//! Database module
//!
//! Connection checks, migrations, and schema verification.

use sqlx::PgPool;

/// Tables the service cannot run without
const REQUIRED_TABLES: &[&str] = &[
    "operators",
    "customers",
    "wash_transactions",
    "commissions",
    "commission_payouts",
    "attendance",
    "api_keys",
    "rate_limit_buckets",
    "audit_logs",
];

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the SQL files under migrations/
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let active_operators: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM operators WHERE is_active")
            .fetch_one(pool)
            .await?;
    if active_operators == 0 {
        tracing::warn!("No active operators; washes cannot be recorded until one is added");
    }

    Ok(true)
}

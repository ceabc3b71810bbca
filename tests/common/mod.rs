//! Common test utilities
//!
//! Suites share one database, which must be reachable through DATABASE_URL.
//! Every test seeds its own operators, plates and API keys, so no table is
//! ever truncated and suites can run in parallel.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use motowash::api::middleware::hash_api_key;
use motowash::clock::FixedClock;
use motowash::domain::{CodeGenerator, Role};
use motowash::handlers::Collaborators;

/// Database suites fail instead of passing vacuously without a database
pub fn require_database_url(value: Option<String>) -> String {
    value.expect("DATABASE_URL must be set for tests")
}

/// Connect and migrate
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = require_database_url(std::env::var("DATABASE_URL").ok());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    motowash::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// A pool that never connects; enough for requests rejected before any query
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .connect_lazy("postgres://localhost/motowash_unused")
        .expect("Failed to build lazy pool")
}

/// Normalized plate no other test uses
pub fn unique_plate() -> String {
    format!("T{}", &Uuid::new_v4().simple().to_string()[..10].to_uppercase())
}

pub async fn seed_operator(pool: &PgPool, commission_rate: Decimal) -> i64 {
    seed_operator_with(pool, commission_rate, true).await
}

pub async fn seed_operator_with(pool: &PgPool, commission_rate: Decimal, is_active: bool) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO operators (name, commission_rate, is_active)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(format!("Operator {}", &Uuid::new_v4().simple().to_string()[..6]))
    .bind(commission_rate)
    .bind(is_active)
    .fetch_one(pool)
    .await
    .expect("Failed to seed operator")
}

pub async fn seed_customer(
    pool: &PgPool,
    plate: &str,
    loyalty_count: i32,
    free_wash_available: bool,
) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO customers (license_plate, name, is_member, loyalty_count, free_wash_available, total_washes)
        VALUES ($1, 'Seeded Customer', TRUE, $2, $3, $2)
        RETURNING id
        "#,
    )
    .bind(plate)
    .bind(loyalty_count)
    .bind(free_wash_available)
    .fetch_one(pool)
    .await
    .expect("Failed to seed customer")
}

/// Seed an API key and return the raw key
pub async fn seed_api_key(pool: &PgPool, role: Role, user_id: i64) -> String {
    let raw_key = format!("mw_test_{}", Uuid::new_v4().simple());

    sqlx::query(
        r#"
        INSERT INTO api_keys (id, name, key_hash, user_id, role, is_active)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(format!("test {role}"))
    .bind(hash_api_key(&raw_key))
    .bind(user_id)
    .bind(role.as_str())
    .execute(pool)
    .await
    .expect("Failed to seed API key");

    raw_key
}

pub async fn operator_totals(pool: &PgPool, operator_id: i64) -> (Decimal, i32) {
    sqlx::query_as("SELECT total_commission, total_washes FROM operators WHERE id = $1")
        .bind(operator_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read operator")
}

pub fn collaborators_at(at: DateTime<Utc>) -> Collaborators {
    Collaborators::default().with_clock(Arc::new(FixedClock(at)))
}

/// Always hands out the same code
pub struct FixedCodeGenerator(pub String);

impl FixedCodeGenerator {
    pub fn unique() -> Self {
        Self(format!("TRX-FIXED-{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase()))
    }
}

impl CodeGenerator for FixedCodeGenerator {
    fn next_code(&self, _business_date: chrono::NaiveDate) -> String {
        self.0.clone()
    }
}

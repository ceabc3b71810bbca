//! Rate limiting
//!
//! Fixed one-minute windows keyed by caller identity. The middleware only
//! sees the `RateLimiter` trait; which backend counts requests is decided in
//! `main`.

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

impl RateDecision {
    fn from_count(count: u32, limit: u32) -> Self {
        Self {
            allowed: count <= limit,
            limit,
            remaining: limit.saturating_sub(count),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `client_key` in the current window.
    async fn check(&self, client_key: &str) -> Result<RateDecision, RateLimitError>;
}

// =========================================================================
// Postgres backend
// =========================================================================

/// Counts in `rate_limit_buckets`; expired windows are purged by the
/// maintenance job.
#[derive(Clone)]
pub struct PgRateLimiter {
    pool: PgPool,
    limit_per_minute: u32,
}

impl PgRateLimiter {
    pub fn new(pool: PgPool, limit_per_minute: u32) -> Self {
        Self {
            pool,
            limit_per_minute,
        }
    }
}

#[async_trait]
impl RateLimiter for PgRateLimiter {
    async fn check(&self, client_key: &str) -> Result<RateDecision, RateLimitError> {
        let count: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO rate_limit_buckets (client_key, window_start, request_count)
            VALUES ($1, date_trunc('minute', NOW()), 1)
            ON CONFLICT (client_key, window_start)
            DO UPDATE SET request_count = rate_limit_buckets.request_count + 1
            RETURNING request_count
            "#,
        )
        .bind(client_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(RateDecision::from_count(
            u32::try_from(count).unwrap_or(u32::MAX),
            self.limit_per_minute,
        ))
    }
}

// =========================================================================
// In-memory backend
// =========================================================================

/// Single-process limiter for tests and single-node deployments
pub struct InMemoryRateLimiter {
    limit_per_minute: u32,
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<String, (DateTime<Utc>, u32)>>,
}

impl InMemoryRateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self::with_clock(limit_per_minute, Arc::new(SystemClock))
    }

    pub fn with_clock(limit_per_minute: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit_per_minute,
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn current_window(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now)
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, client_key: &str) -> Result<RateDecision, RateLimitError> {
        let window = self.current_window();
        let mut buckets = self.buckets.lock().await;

        // Drop windows that have already closed
        buckets.retain(|_, (start, _)| *start >= window);

        let entry = buckets
            .entry(client_key.to_string())
            .or_insert((window, 0));
        entry.1 = entry.1.saturating_add(1);

        Ok(RateDecision::from_count(entry.1, self.limit_per_minute))
    }
}

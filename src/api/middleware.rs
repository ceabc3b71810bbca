//! API Middleware
//!
//! Authentication, rate limiting and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{OperationContext, Role};
use crate::error::AppError;
use crate::rate_limit::RateLimiter;

use super::operations::Operation;

/// Identity behind a valid API key
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller {
    pub key_id: Uuid,
    pub user_id: i64,
    pub role: Role,
}

impl AuthenticatedCaller {
    pub fn authorize(&self, operation: Operation) -> Result<(), AppError> {
        if operation.permits(self.role) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = self.user_id,
                role = %self.role,
                operation = %operation,
                "Permission denied"
            );
            Err(AppError::PermissionDenied)
        }
    }

    /// Like `authorize`, but an operator may only act on their own record.
    pub fn authorize_for_operator(
        &self,
        operation: Operation,
        operator_id: i64,
    ) -> Result<(), AppError> {
        self.authorize(operation)?;
        if self.role == Role::Operator && self.user_id != operator_id {
            tracing::warn!(
                user_id = self.user_id,
                operator_id,
                operation = %operation,
                "Operator acting on another operator"
            );
            return Err(AppError::PermissionDenied);
        }
        Ok(())
    }
}

/// Hex SHA-256 of a raw API key, as stored in `api_keys.key_hash`
pub fn hash_api_key(raw_key: &str) -> String {
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

// =========================================================================
// API Key Authentication Middleware
// =========================================================================

/// Resolve X-API-Key to a caller and attach the operation context
pub async fn auth_middleware(
    State(pool): State<PgPool>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::MissingHeader("X-API-Key".to_string()))?;

    let record: Option<(Uuid, i64, String, bool)> = sqlx::query_as(
        r#"
        SELECT id, user_id, role, is_active
        FROM api_keys
        WHERE key_hash = $1
        "#,
    )
    .bind(hash_api_key(api_key))
    .fetch_optional(&pool)
    .await?;

    let (key_id, user_id, role, is_active) = record.ok_or(AppError::InvalidApiKey)?;

    if !is_active {
        tracing::warn!(key_id = %key_id, "Disabled API key used");
        return Err(AppError::InvalidApiKey);
    }

    let role: Role = role
        .parse()
        .map_err(|_| AppError::Internal(format!("api key {key_id} has unknown role {role}")))?;

    let correlation_id = ["X-Correlation-Id", "X-Request-Id"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .find_map(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let mut context = OperationContext::new()
        .with_api_key(key_id)
        .with_caller(user_id, role)
        .with_correlation_id(correlation_id);

    if let Some(ip) = client_ip(&headers) {
        context = context.with_client_ip(ip);
    }

    request.extensions_mut().insert(AuthenticatedCaller {
        key_id,
        user_id,
        role,
    });
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// First address in X-Forwarded-For
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
}

// =========================================================================
// Rate Limiting Middleware
// =========================================================================

/// Fixed-window limit per API key. Must run after `auth_middleware`.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<dyn RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let caller = request
        .extensions()
        .get::<AuthenticatedCaller>()
        .cloned()
        .ok_or_else(|| AppError::Internal("Auth middleware must run first".to_string()))?;

    let decision = limiter.check(&caller.key_id.to_string()).await?;

    if !decision.allowed {
        tracing::warn!(key_id = %caller.key_id, limit = decision.limit, "Rate limit exceeded");
        return Err(AppError::RateLimitExceeded);
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));

    Ok(response)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["x-api-key", "authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked_value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let start = std::time::Instant::now();

    tracing::debug!(
        method = %method,
        uri = %uri,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        "Request completed"
    );

    response
}

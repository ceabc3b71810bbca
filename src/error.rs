//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::rate_limit::RateLimitError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Error category every `AppError` collapses to at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
    Unauthorized,
    Forbidden,
    RateLimited,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidRequest(_) | AppError::MissingHeader(_) => ErrorKind::Validation,
            AppError::InvalidApiKey => ErrorKind::Unauthorized,
            AppError::PermissionDenied => ErrorKind::Forbidden,
            AppError::RateLimitExceeded => ErrorKind::RateLimited,
            AppError::Domain(DomainError::Validation(_)) => ErrorKind::Validation,
            AppError::Domain(DomainError::NotFound { .. }) => ErrorKind::NotFound,
            AppError::Domain(DomainError::Conflict(_)) => ErrorKind::Conflict,
            AppError::Database(_) => ErrorKind::Storage,
            AppError::Internal(_) | AppError::Config(_) => ErrorKind::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::InvalidApiKey => "invalid_api_key",
            AppError::PermissionDenied => "permission_denied",
            AppError::RateLimitExceeded => "rate_limit_exceeded",
            AppError::MissingHeader(_) => "missing_header",
            AppError::Domain(DomainError::Validation(_)) => "validation_error",
            AppError::Domain(DomainError::NotFound { .. }) => "not_found",
            AppError::Domain(DomainError::Conflict(_)) => "conflict",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
        }
    }
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Storage(e) => AppError::Database(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        let details = match &self {
            AppError::InvalidRequest(msg) | AppError::MissingHeader(msg) => Some(msg.clone()),
            AppError::Domain(DomainError::NotFound { id, .. }) => Some(id.clone()),
            _ => None,
        };

        // Server-side failures are logged in full and reported generically
        let error = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                "Internal server error".to_string()
            }
            AppError::Domain(DomainError::Conflict(msg)) => {
                tracing::warn!(conflict = %msg, "Request rejected");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            error,
            error_code: self.error_code().to_string(),
            details,
        };

        (kind.status_code(), Json(body)).into_response()
    }
}

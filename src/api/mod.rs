//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod operations;
pub mod routes;

use axum::{middleware as axum_middleware, routing::get, Extension, Router};
use sqlx::PgPool;
use std::sync::Arc;

use crate::handlers::Collaborators;
use crate::rate_limit::RateLimiter;

pub use operations::Operation;
pub use routes::create_router;

/// Full application router: /health plus the authenticated /api/v1 tree
pub fn build_router(
    pool: PgPool,
    collaborators: Collaborators,
    rate_limiter: Arc<dyn RateLimiter>,
) -> Router {
    // Layers run last-added first: logging -> auth -> rate_limit -> handler
    let protected_routes = create_router()
        .layer(axum_middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            pool.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", protected_routes)
        .layer(Extension(collaborators))
        .with_state(pool)
}

async fn health_check() -> &'static str {
    "OK"
}

//! HTTP handlers and route configuration.

mod health;
mod rate_limit;

use actix_web::{HttpRequest, HttpResponse, web};

use crate::middleware::error::{AppError, AppResult};

/// Paths the rate limiter never counts.
pub const EXEMPT_PATHS: &[&str] = &["/api/health"];

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .route("/rate-limit/status", web::get().to(rate_limit::status)),
    );
}

/// Fallback for unmatched routes.
pub async fn not_found(req: HttpRequest) -> AppResult<HttpResponse> {
    Err(AppError::NotFound(req.path().to_string()))
}

//! Health check endpoint.

use actix_web::{HttpResponse, web};

use ratewise_shared::dto::HealthResponse;

use crate::state::AppState;

/// Health check endpoint - returns server status and the counter backend.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    #[cfg(feature = "redis")]
    let shared_store_reachable = match &state.shared_store {
        Some(store) => Some(store.ping().await.is_ok()),
        None => None,
    };
    #[cfg(not(feature = "redis"))]
    let shared_store_reachable = None;

    let status = match shared_store_reachable {
        Some(false) => "degraded",
        _ => "ok",
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        rate_limit_backend: state.limiter.mode().to_string(),
        shared_store_reachable,
    };

    HttpResponse::Ok().json(response)
}

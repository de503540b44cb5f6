//! Rate limit diagnostics.

use actix_web::{HttpRequest, HttpResponse, web};

use ratewise_shared::ApiResponse;
use ratewise_shared::dto::RateLimitStatus;

use crate::middleware::ClientKeyExtractor;
use crate::state::AppState;

/// Current window standing of the calling client. The request itself has
/// already been counted by the middleware when this runs, under the same key.
///
/// GET /api/rate-limit/status
pub async fn status(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let key = state.key_extractor.key_for(&req);

    let quota = state.limiter.quota();
    let used = state.limiter.peek(&key).await.unwrap_or(0);

    let status = RateLimitStatus {
        key: key.to_string(),
        backend: state.limiter.mode().to_string(),
        limit: quota.limit(),
        window_seconds: quota.window().window_seconds(),
        used,
        remaining: u64::from(quota.limit()).saturating_sub(used) as u32,
        reset_after_secs: state.limiter.reset_after_secs(),
    };

    HttpResponse::Ok().json(ApiResponse::ok(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};
    use ratewise_core::Quota;
    use ratewise_core::ports::ManualClock;

    use crate::handlers::{EXEMPT_PATHS, configure_routes, not_found};
    use crate::middleware::{PeerIpKeyExtractor, RateLimitMiddleware};

    fn state() -> AppState {
        AppState::in_memory(
            Arc::new(ManualClock::at(1_700_000_040)),
            Quota::new(5, 60).unwrap(),
            Arc::new(PeerIpKeyExtractor),
        )
    }

    fn status_request(ip: &str) -> test::TestRequest {
        test::TestRequest::get()
            .uri("/api/rate-limit/status")
            .peer_addr(format!("{}:40000", ip).parse().unwrap())
    }

    #[actix_web::test]
    async fn test_status_reports_usage_including_itself() {
        let state = state();
        let app = test::init_service(
            App::new()
                .wrap(
                    RateLimitMiddleware::new(state.limiter.clone(), state.key_extractor.clone())
                        .exempt(EXEMPT_PATHS.iter().copied()),
                )
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        test::call_service(&app, status_request("198.51.100.9").to_request()).await;
        let res = test::call_service(&app, status_request("198.51.100.9").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(res).await;
        let data = &body["data"];
        assert_eq!(body["success"], true);
        assert_eq!(data["key"], "198.51.100.9");
        assert_eq!(data["backend"], "local");
        assert_eq!(data["limit"], 5);
        assert_eq!(data["window_seconds"], 60);
        assert_eq!(data["used"], 2);
        assert_eq!(data["remaining"], 3);
        assert_eq!(data["reset_after_secs"], 60);
    }

    #[actix_web::test]
    async fn test_status_without_client_identity_reports_unknown_bucket() {
        let state = state();
        let app = test::init_service(
            App::new()
                .wrap(
                    RateLimitMiddleware::new(state.limiter.clone(), state.key_extractor.clone())
                        .exempt(EXEMPT_PATHS.iter().copied()),
                )
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/rate-limit/status")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["key"], "unknown");
        assert_eq!(body["data"]["used"], 1);
        assert_eq!(body["data"]["remaining"], 4);
    }

    #[actix_web::test]
    async fn test_unknown_route_is_problem_details_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(configure_routes)
                .default_service(web::to(not_found)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/nope").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["title"], "Not Found");
        assert_eq!(body["instance"], "/api/nope");
    }

    #[actix_web::test]
    async fn test_health_is_exempt_and_reports_backend() {
        let state = state();
        let app = test::init_service(
            App::new()
                .wrap(
                    RateLimitMiddleware::new(state.limiter.clone(), state.key_extractor.clone())
                        .exempt(EXEMPT_PATHS.iter().copied()),
                )
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        for _ in 0..10 {
            let req = test::TestRequest::get()
                .uri("/api/health")
                .peer_addr("198.51.100.9:40000".parse().unwrap())
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri("/api/health")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["rate_limit_backend"], "local");
        assert!(body.get("shared_store_reachable").is_none());
        assert_eq!(state.local_store.len(), 0, "health checks are never counted");
    }
}

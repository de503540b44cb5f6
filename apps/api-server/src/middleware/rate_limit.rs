//! Rate limiting middleware.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
};
use ratewise_shared::ErrorResponse;
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use ratewise_core::{Decision, RateLimiter};

use super::client_key::ClientKeyExtractor;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    limiter: RateLimiter,
    extractor: Arc<dyn ClientKeyExtractor>,
    exempt_paths: Rc<Vec<String>>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: RateLimiter, extractor: Arc<dyn ClientKeyExtractor>) -> Self {
        Self {
            limiter,
            extractor,
            exempt_paths: Rc::new(Vec::new()),
        }
    }

    /// Paths served without counting, matched exactly.
    pub fn exempt<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.exempt_paths = Rc::new(paths.into_iter().map(Into::into).collect());
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            extractor: self.extractor.clone(),
            exempt_paths: self.exempt_paths.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: RateLimiter,
    extractor: Arc<dyn ClientKeyExtractor>,
    exempt_paths: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        if self.exempt_paths.iter().any(|p| p == req.path()) {
            return Box::pin(async move {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            });
        }

        let limiter = self.limiter.clone();
        let key = self.extractor.key_for(req.request());

        Box::pin(async move {
            let decision = limiter.check(&key).await;

            if !decision.allowed {
                tracing::warn!(
                    key = %key,
                    limit = decision.limit,
                    reset_after_secs = decision.reset_after_secs,
                    "Rate limit exceeded"
                );

                let error = ErrorResponse::too_many_requests(decision.reset_after_secs)
                    .with_instance(req.path());

                let mut response = HttpResponse::TooManyRequests()
                    .insert_header((RETRY_AFTER, decision.reset_after_secs.to_string()))
                    .json(error);
                insert_quota_headers(response.headers_mut(), &decision);

                let (http_req, _payload) = req.into_parts();
                let srv_response = ServiceResponse::new(http_req, response);
                return Ok(srv_response.map_into_right_body());
            }

            let mut res = service.call(req).await?;
            insert_quota_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}

fn insert_quota_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(
        HeaderName::from_static(LIMIT_HEADER),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static(RESET_HEADER),
        HeaderValue::from(decision.reset_after_secs),
    );
}

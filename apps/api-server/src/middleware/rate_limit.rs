//! Rate limiting middleware.

use std::future::{Future, Ready, ready};
use std::net::SocketAddr;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use actix_web::{
    Error, HttpMessage, HttpRequest, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::RETRY_AFTER,
};
use tollgate_core::ports::RateLimiter;
use tollgate_shared::{ErrorResponse, RateLimitExceeded};

use crate::config::RateLimitSettings;
use crate::observability::{Decision, RateLimitMetrics, RequestId};

/// Client identity used as the rate-limit key.
///
/// The TCP peer IP unless `trust_forwarded` is set, in which case the
/// `Forwarded`/`X-Forwarded-For` address wins. `"unknown"` if neither exists.
pub fn client_identity(req: &HttpRequest, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = req
            .connection_info()
            .realip_remote_addr()
            .map(strip_port);
        if let Some(ip) = forwarded {
            return ip;
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn strip_port(addr: &str) -> String {
    addr.parse::<SocketAddr>()
        .map(|socket| socket.ip().to_string())
        .unwrap_or_else(|_| addr.to_string())
}

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    settings: Arc<RateLimitSettings>,
    metrics: Arc<RateLimitMetrics>,
}

impl RateLimitMiddleware {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        settings: Arc<RateLimitSettings>,
        metrics: Arc<RateLimitMetrics>,
    ) -> Self {
        Self {
            limiter,
            settings,
            metrics,
        }
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
            settings: self.settings.clone(),
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    settings: Arc<RateLimitSettings>,
    metrics: Arc<RateLimitMetrics>,
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
        let limiter = self.limiter.clone();
        let settings = self.settings.clone();
        let metrics = self.metrics.clone();

        Box::pin(async move {
            if settings.exempt_routes.contains(req.path()) {
                metrics.record(Decision::Exempt);
                return service.call(req).await.map(ServiceResponse::map_into_left_body);
            }

            let client_ip = client_identity(req.request(), settings.trust_forwarded);

            let started = Instant::now();
            let decision = limiter.is_allowed(&client_ip).await;
            metrics.observe_check(started.elapsed().as_secs_f64());

            match decision {
                Ok(true) => {
                    metrics.record(Decision::Allowed);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Ok(false) => {
                    metrics.record(Decision::Denied);
                    let retry_after = match limiter.retry_after(&client_ip).await {
                        Ok(wait) => wait.map(|d| d.as_secs_f64()),
                        Err(e) => {
                            tracing::warn!(error = %e, "Could not compute retry_after");
                            None
                        }
                    };

                    tracing::warn!(
                        client_ip = %client_ip,
                        path = %req.path(),
                        retry_after = ?retry_after,
                        "Rate limit exceeded"
                    );

                    let body = RateLimitExceeded::new(retry_after);
                    let response = HttpResponse::TooManyRequests()
                        .insert_header((RETRY_AFTER, body.retry_after_header().to_string()))
                        .json(body);

                    Ok(req.into_response(response).map_into_right_body())
                }
                Err(e) if settings.failure_policy.admits_on_error() => {
                    metrics.record(Decision::StoreError);
                    tracing::error!(
                        error = %e,
                        client_ip = %client_ip,
                        "Rate limiter unavailable, failing open"
                    );
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(e) => {
                    metrics.record(Decision::StoreError);
                    tracing::error!(
                        error = %e,
                        client_ip = %client_ip,
                        "Rate limiter unavailable, failing closed"
                    );

                    let mut problem = ErrorResponse::service_unavailable("Rate limiter unavailable");
                    if let Some(id) = req.extensions().get::<RequestId>() {
                        problem = problem.with_request_id(id.as_str());
                    }
                    let response = HttpResponse::ServiceUnavailable().json(problem);

                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

//! Request ID middleware - correlates log lines and responses per request.

use std::future::{Future, Ready, ready};
use std::pin::Pin;

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use tracing::Instrument;
use uuid::Uuid;

/// Reuses an incoming request ID (from a client or load balancer) or mints
/// a UUID v4, records it on the request span and echoes it on the response.
#[derive(Clone)]
pub struct RequestIdMiddleware {
    header: HeaderName,
}

impl RequestIdMiddleware {
    /// Falls back to `x-request-id` if `header_name` is not a valid header name.
    pub fn new(header_name: &str) -> Self {
        let header = HeaderName::try_from(header_name).unwrap_or_else(|_| {
            tracing::warn!(header = %header_name, "Invalid request id header, using x-request-id");
            HeaderName::from_static("x-request-id")
        });
        Self { header }
    }
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self::new("x-request-id")
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestIdService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdService {
            service,
            header: self.header.clone(),
        }))
    }
}

pub struct RequestIdService<S> {
    service: S,
    header: HeaderName,
}

impl<S, B> Service<ServiceRequest> for RequestIdService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let incoming = req
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .and_then(|v| HeaderValue::from_str(v).ok().map(|hv| (v.to_string(), hv)));

        let (request_id, header_value) = incoming.unwrap_or_else(|| {
            let id = Uuid::new_v4().to_string();
            // A hyphenated UUID is always a valid header value.
            let value = HeaderValue::from_str(&id).unwrap_or(HeaderValue::from_static("unknown"));
            (id, value)
        });

        req.extensions_mut().insert(RequestId(request_id.clone()));

        let span = tracing::info_span!("request", request_id = %request_id);
        let header = self.header.clone();
        let fut = self.service.call(req);

        Box::pin(
            async move {
                let mut res = fut.await?;
                res.headers_mut().insert(header, header_value);
                Ok(res)
            }
            .instrument(span),
        )
    }
}

/// Request ID extractor for handlers.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl actix_web::FromRequest for RequestId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &actix_web::HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId(Uuid::new_v4().to_string()));

        ready(Ok(request_id))
    }
}

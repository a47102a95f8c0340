//! HTTP handlers and route configuration.

mod health;
mod metrics;
mod rate_limit;

use actix_web::{HttpRequest, HttpResponse, web};

use crate::middleware::error::AppError;
use crate::observability::RequestId;

/// Configure all application routes: the API under `api_prefix` and the
/// metrics scrape at `metrics_path`.
pub fn configure_routes(cfg: &mut web::ServiceConfig, api_prefix: &str, metrics_path: &str) {
    cfg.route(metrics_path, web::get().to(metrics::metrics))
        .service(
            web::scope(api_prefix)
                .route("/health", web::get().to(health::health_check))
                .route("/rate-limit/status", web::get().to(rate_limit::status)),
        );
}

/// Fallback for unmatched routes.
pub async fn not_found(req: HttpRequest, request_id: RequestId) -> HttpResponse {
    AppError::NotFound(format!("No route for {}", req.path())).respond_with(&request_id)
}

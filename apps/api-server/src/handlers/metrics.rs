//! Prometheus scrape endpoint.

use actix_web::{HttpResponse, web};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// GET {metrics_path}
pub async fn metrics(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(format!("failed to encode metrics: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

//! Health check endpoint.

use actix_web::{HttpResponse, web};
use tollgate_shared::dto::HealthResponse;

use crate::state::AppState;

/// GET {api_prefix}/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        environment: state.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    HttpResponse::Ok().json(response)
}

//! Rate-limit introspection endpoint.

use actix_web::{HttpRequest, HttpResponse, web};
use tollgate_shared::ApiResponse;
use tollgate_shared::dto::RateLimitStatus;

use crate::middleware::error::AppResult;
use crate::middleware::rate_limit::client_identity;
use crate::observability::RequestId;
use crate::state::AppState;

/// Report the caller's usage of its current window without recording an event.
///
/// GET {api_prefix}/rate-limit/status
pub async fn status(
    req: HttpRequest,
    request_id: RequestId,
    state: web::Data<AppState>,
) -> HttpResponse {
    let client_id = client_identity(&req, state.rate_limit.trust_forwarded);

    match window_status(&state, client_id).await {
        Ok(status) => HttpResponse::Ok().json(ApiResponse::ok(status)),
        Err(e) => e.respond_with(&request_id),
    }
}

async fn window_status(state: &AppState, client_id: String) -> AppResult<RateLimitStatus> {
    let count = state
        .limiter
        .request_count(&client_id)
        .await?;
    let retry_after = state
        .limiter
        .retry_after(&client_id)
        .await?
        .map(|wait| wait.as_secs_f64());

    let policy = state.limiter.policy();
    let limit = policy.max_requests();
    let remaining = u64::from(limit).saturating_sub(count) as u32;

    Ok(RateLimitStatus {
        client_id,
        count,
        limit,
        remaining,
        window_seconds: policy.window().as_secs_f64(),
        retry_after,
    })
}

//! Observability module - request correlation and metrics.

mod metrics;
mod request_id;

pub use metrics::{Decision, RateLimitMetrics};
pub use request_id::{RequestId, RequestIdMiddleware};

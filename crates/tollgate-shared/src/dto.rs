//! Data Transfer Objects - response payloads for the API.

use serde::{Deserialize, Serialize};

/// Liveness payload for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub version: String,
    pub timestamp: String,
}

/// The caller's current position in its rate-limit window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub client_id: String,
    pub count: u64,
    pub limit: u32,
    pub remaining: u32,
    pub window_seconds: f64,
    /// Seconds until capacity frees up, `null` when there is capacity now.
    pub retry_after: Option<f64>,
}

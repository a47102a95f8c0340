//! Application state - shared across all handlers.

use std::sync::Arc;

use tollgate_core::ports::{RateLimiter, WindowStore};
use tollgate_core::{RateLimitError, SlidingWindowLimiter};
use tollgate_infra::{InMemoryWindowStore, RedisConfig};

#[cfg(feature = "redis")]
use tollgate_infra::RedisWindowStore;

use crate::config::{AppConfig, RateLimitSettings};
use crate::observability::RateLimitMetrics;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<dyn RateLimiter>,
    pub rate_limit: Arc<RateLimitSettings>,
    pub metrics: Arc<RateLimitMetrics>,
    pub environment: String,
}

impl AppState {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        rate_limit: RateLimitSettings,
        metrics: Arc<RateLimitMetrics>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            limiter,
            rate_limit: Arc::new(rate_limit),
            metrics,
            environment: environment.into(),
        }
    }

    /// Connect the window store and build the limiter on top of it.
    ///
    /// Fails on invalid limiter settings, or when Redis is configured,
    /// unreachable and fallback is disabled.
    pub async fn build(
        config: &AppConfig,
        metrics: Arc<RateLimitMetrics>,
    ) -> Result<Self, RateLimitError> {
        let store = build_store(config.redis.as_ref()).await?;

        let settings = &config.rate_limit;
        let limiter =
            SlidingWindowLimiter::from_parts(store, settings.max_requests, settings.window)?
                .with_mode(settings.mode)
                .with_key_prefix(settings.key_prefix.clone());

        tracing::info!(
            max_requests = settings.max_requests,
            window_secs = settings.window.as_secs_f64(),
            mode = ?settings.mode,
            failure_policy = %settings.failure_policy,
            exempt_routes = settings.exempt_routes.len(),
            "Rate limiter initialized"
        );

        Ok(Self::new(
            Arc::new(limiter),
            settings.clone(),
            metrics,
            config.environment.clone(),
        ))
    }
}

#[cfg(feature = "redis")]
async fn build_store(
    redis: Option<&RedisConfig>,
) -> Result<Arc<dyn WindowStore>, RateLimitError> {
    let Some(config) = redis else {
        tracing::warn!("REDIS_URL not set. Rate limits are per-process (in-memory store).");
        return Ok(Arc::new(InMemoryWindowStore::new()));
    };

    match RedisWindowStore::new(config.clone()).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) if config.fallback_to_memory => {
            tracing::error!(
                error = %e,
                "Failed to connect to Redis. Using in-memory fallback; limits are per-process."
            );
            Ok(Arc::new(InMemoryWindowStore::new()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_store(
    redis: Option<&RedisConfig>,
) -> Result<Arc<dyn WindowStore>, RateLimitError> {
    if redis.is_some() {
        tracing::warn!("Built without redis feature - ignoring REDIS_URL");
    }
    tracing::info!("Running with in-memory window store");
    Ok(Arc::new(InMemoryWindowStore::new()))
}

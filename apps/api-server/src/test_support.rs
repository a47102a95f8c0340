//! Limiter doubles shared by the HTTP tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tollgate_core::SlidingWindowLimiter;
use tollgate_core::StoreError;
use tollgate_core::domain::WindowPolicy;
use tollgate_core::ports::{Admission, RateLimiter, WindowStore};
use tollgate_infra::InMemoryWindowStore;

use crate::config::RateLimitSettings;
use crate::observability::RateLimitMetrics;
use crate::state::AppState;

/// Store whose every call fails, as an unreachable Redis would.
pub struct DownStore;

fn refused() -> StoreError {
    StoreError::Connection("connection refused".to_string())
}

#[async_trait]
impl WindowStore for DownStore {
    async fn purge_before(&self, _key: &str, _cutoff: f64) -> Result<u64, StoreError> {
        Err(refused())
    }

    async fn cardinality(&self, _key: &str) -> Result<u64, StoreError> {
        Err(refused())
    }

    async fn insert(&self, _key: &str, _member: &str, _score: f64) -> Result<(), StoreError> {
        Err(refused())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(refused())
    }

    async fn earliest(&self, _key: &str) -> Result<Option<f64>, StoreError> {
        Err(refused())
    }

    async fn admit(&self, _admission: &Admission<'_>) -> Result<bool, StoreError> {
        Err(refused())
    }
}

/// Store that always reports a full window but has no earliest member, or
/// fails to read it when `earliest_fails` is set.
pub struct FullWindowStore {
    pub earliest_fails: bool,
}

#[async_trait]
impl WindowStore for FullWindowStore {
    async fn purge_before(&self, _key: &str, _cutoff: f64) -> Result<u64, StoreError> {
        Ok(0)
    }

    async fn cardinality(&self, _key: &str) -> Result<u64, StoreError> {
        Ok(u64::MAX)
    }

    async fn insert(&self, _key: &str, _member: &str, _score: f64) -> Result<(), StoreError> {
        Ok(())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
        Ok(())
    }

    async fn earliest(&self, _key: &str) -> Result<Option<f64>, StoreError> {
        if self.earliest_fails {
            Err(StoreError::Timeout(Duration::from_millis(500)))
        } else {
            Ok(None)
        }
    }

    async fn admit(&self, _admission: &Admission<'_>) -> Result<bool, StoreError> {
        Ok(false)
    }
}

pub fn memory_limiter(max_requests: u32, window_secs: u64) -> Arc<dyn RateLimiter> {
    let policy = WindowPolicy::per_seconds(max_requests, window_secs).unwrap();
    Arc::new(SlidingWindowLimiter::new(Arc::new(InMemoryWindowStore::new()), policy))
}

pub fn down_limiter() -> Arc<dyn RateLimiter> {
    let policy = WindowPolicy::per_seconds(10, 60).unwrap();
    Arc::new(SlidingWindowLimiter::new(Arc::new(DownStore), policy))
}

pub fn full_limiter(earliest_fails: bool) -> Arc<dyn RateLimiter> {
    let policy = WindowPolicy::per_seconds(10, 60).unwrap();
    Arc::new(SlidingWindowLimiter::new(
        Arc::new(FullWindowStore { earliest_fails }),
        policy,
    ))
}

pub fn state_with(limiter: Arc<dyn RateLimiter>) -> AppState {
    AppState::new(
        limiter,
        RateLimitSettings::default(),
        Arc::new(RateLimitMetrics::new().unwrap()),
        "test",
    )
}

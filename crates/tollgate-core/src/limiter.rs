//! Sliding-window-log limiter over a shared [`WindowStore`].
//!
//! Every admitted event is stored as its own scored member, so the window is
//! exact: there is no burst at bucket boundaries the way fixed-window counters
//! have. Expired members are purged on every call rather than by a sweeper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{AdmissionMode, WindowPolicy};
use crate::error::RateLimitError;
use crate::ports::{Admission, Clock, RateLimiter, SystemClock, WindowStore};

/// Default key namespace; keys look like `rate_limit:<client_id>`.
pub const DEFAULT_KEY_PREFIX: &str = "rate_limit";

/// Per-key admission gate whose state lives entirely in the store, so any
/// number of service instances pointing at one store share one limiter.
pub struct SlidingWindowLimiter {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    policy: WindowPolicy,
    mode: AdmissionMode,
    key_prefix: String,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn WindowStore>, policy: WindowPolicy) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy,
            mode: AdmissionMode::default(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Validate raw settings and build a limiter with default mode and clock.
    pub fn from_parts(
        store: Arc<dyn WindowStore>,
        max_requests: u32,
        window: Duration,
    ) -> Result<Self, RateLimitError> {
        Ok(Self::new(store, WindowPolicy::new(max_requests, window)?))
    }

    pub fn with_mode(mut self, mode: AdmissionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn mode(&self) -> AdmissionMode {
        self.mode
    }

    pub fn key_for(&self, client_id: &str) -> String {
        format!("{}:{}", self.key_prefix, client_id)
    }

    /// Members must stay unique even when two admissions share a timestamp.
    fn member_for(now: f64) -> String {
        format!("{:.6}:{}", now, Uuid::new_v4().simple())
    }

    async fn purge_and_count(&self, key: &str, now: f64) -> Result<u64, RateLimitError> {
        self.store.purge_before(key, self.policy.cutoff(now)).await?;
        Ok(self.store.cardinality(key).await?)
    }

    async fn admit_two_step(&self, key: &str, now: f64) -> Result<bool, RateLimitError> {
        let count = self.purge_and_count(key, now).await?;
        if count >= u64::from(self.policy.max_requests()) {
            return Ok(false);
        }

        // Not atomic with the read above: concurrent callers may all pass.
        let member = Self::member_for(now);
        self.store.insert(key, &member, now).await?;
        self.store.expire(key, self.policy.ttl()).await?;
        Ok(true)
    }

    async fn admit_atomic(&self, key: &str, now: f64) -> Result<bool, RateLimitError> {
        let member = Self::member_for(now);
        let admission = Admission {
            key,
            member: &member,
            score: now,
            cutoff: self.policy.cutoff(now),
            max_requests: self.policy.max_requests(),
            ttl: self.policy.ttl(),
        };
        Ok(self.store.admit(&admission).await?)
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn is_allowed(&self, client_id: &str) -> Result<bool, RateLimitError> {
        let key = self.key_for(client_id);
        let now = self.clock.now();

        let allowed = match self.mode {
            AdmissionMode::TwoStep => self.admit_two_step(&key, now).await?,
            AdmissionMode::Atomic => self.admit_atomic(&key, now).await?,
        };

        tracing::trace!(key = %key, allowed, "Admission decided");
        Ok(allowed)
    }

    async fn retry_after(&self, client_id: &str) -> Result<Option<Duration>, RateLimitError> {
        let key = self.key_for(client_id);
        let now = self.clock.now();

        let count = self.purge_and_count(&key, now).await?;
        if count < u64::from(self.policy.max_requests()) {
            return Ok(None);
        }

        let Some(earliest) = self.store.earliest(&key).await? else {
            return Ok(None);
        };

        let wait = (earliest + self.policy.window().as_secs_f64() - now).max(0.0);
        Ok(Some(Duration::from_secs_f64(wait)))
    }

    async fn request_count(&self, client_id: &str) -> Result<u64, RateLimitError> {
        let key = self.key_for(client_id);
        self.purge_and_count(&key, self.clock.now()).await
    }

    fn policy(&self) -> &WindowPolicy {
        &self.policy
    }
}

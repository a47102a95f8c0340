//! Window store port - a keyed, TTL-capable ordered set of scored members.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Arguments for a single-round-trip admission.
#[derive(Debug, Clone)]
pub struct Admission<'a> {
    pub key: &'a str,
    pub member: &'a str,
    pub score: f64,
    /// Members scored at or below this are purged first.
    pub cutoff: f64,
    pub max_requests: u32,
    pub ttl: Duration,
}

/// Ordered-set store shared by every limiter instance.
///
/// Each method is one round-trip. Implementations must be safe to call from
/// many tasks at once; they are not required to make sequences of calls
/// atomic, except for [`WindowStore::admit`].
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Remove members with score `<= cutoff`. Returns how many were removed.
    async fn purge_before(&self, key: &str, cutoff: f64) -> Result<u64, StoreError>;

    /// Number of members under `key` (0 if absent).
    async fn cardinality(&self, key: &str) -> Result<u64, StoreError>;

    /// Add `member` with `score`, replacing the score if it already exists.
    async fn insert(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;

    /// (Re)set the time-to-live of `key`.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Lowest score under `key`, if any.
    async fn earliest(&self, key: &str) -> Result<Option<f64>, StoreError>;

    /// Purge, count and conditionally insert + expire as one atomic step.
    /// Returns whether the member was inserted.
    async fn admit(&self, admission: &Admission<'_>) -> Result<bool, StoreError>;
}

//! In-memory window store - used as a test double and as the fallback when
//! Redis is unavailable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockWriteGuard};

use tollgate_core::StoreError;
use tollgate_core::ports::{Admission, WindowStore};

/// Every this many writes, expired keys are swept from the whole map.
const SWEEP_EVERY: u64 = 64;

/// One key's members, kept sorted by score.
#[derive(Default)]
struct ScoredSet {
    entries: Vec<(f64, String)>,
    expires_at: Option<Instant>,
}

impl ScoredSet {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    fn purge_before(&mut self, cutoff: f64) -> u64 {
        let stale = self.entries.partition_point(|(score, _)| *score <= cutoff);
        self.entries.drain(..stale);
        stale as u64
    }

    fn insert(&mut self, member: &str, score: f64) {
        if let Some(pos) = self.entries.iter().position(|(_, m)| m == member) {
            self.entries.remove(pos);
        }
        let at = self.entries.partition_point(|(s, _)| *s <= score);
        self.entries.insert(at, (score, member.to_string()));
    }
}

/// Process-local ordered-set store with per-key TTL.
///
/// Each trait method takes the lock once, so a sequence of calls interleaves
/// with other tasks the same way it would against a remote store. Like Redis,
/// a key disappears once its last member is purged or its TTL elapses; keys
/// nobody touches again are swept on a later write.
/// Note: state is per-process and lost on restart.
pub struct InMemoryWindowStore {
    sets: RwLock<HashMap<String, ScoredSet>>,
    writes: AtomicU64,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Take the write lock, sweeping expired keys on every `SWEEP_EVERY`th call.
    async fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ScoredSet>> {
        let mut sets = self.sets.write().await;
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            let now = Instant::now();
            let before = sets.len();
            sets.retain(|_, set| !set.is_expired(now));
            let swept = before - sets.len();
            if swept > 0 {
                tracing::debug!(swept, remaining = sets.len(), "Swept expired window keys");
            }
        }
        sets
    }

    /// Number of live keys.
    pub async fn key_count(&self) -> usize {
        let now = Instant::now();
        let sets = self.sets.read().await;
        sets.values().filter(|set| !set.is_expired(now)).count()
    }

    /// Remaining time-to-live of `key`, if it exists and has one.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let sets = self.sets.read().await;
        let set = sets.get(key).filter(|set| !set.is_expired(now))?;
        set.expires_at.map(|exp| exp.saturating_duration_since(now))
    }

    fn drop_if_expired(sets: &mut HashMap<String, ScoredSet>, key: &str) {
        let now = Instant::now();
        if sets.get(key).is_some_and(|set| set.is_expired(now)) {
            sets.remove(key);
        }
    }

    fn purge_locked(sets: &mut HashMap<String, ScoredSet>, key: &str, cutoff: f64) -> u64 {
        Self::drop_if_expired(sets, key);

        let Some(set) = sets.get_mut(key) else {
            return 0;
        };
        let removed = set.purge_before(cutoff);
        if set.entries.is_empty() {
            sets.remove(key);
        }
        removed
    }
}

/// `None` (never expires) if `ttl` is past what `Instant` can represent.
fn expiry_after(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

impl Default for InMemoryWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn purge_before(&self, key: &str, cutoff: f64) -> Result<u64, StoreError> {
        let mut sets = self.sets.write().await;
        Ok(Self::purge_locked(&mut sets, key, cutoff))
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let sets = self.sets.read().await;
        Ok(sets
            .get(key)
            .filter(|set| !set.is_expired(now))
            .map(|set| set.entries.len() as u64)
            .unwrap_or(0))
    }

    async fn insert(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut sets = self.sets.write().await;
        Self::drop_if_expired(&mut sets, key);
        sets.entry(key.to_string()).or_default().insert(member, score);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut sets = self.sets.write().await;
        Self::drop_if_expired(&mut sets, key);
        // Expiring a missing key is a no-op, as in Redis.
        if let Some(set) = sets.get_mut(key) {
            set.expires_at = expiry_after(ttl);
        }
        Ok(())
    }

    async fn earliest(&self, key: &str) -> Result<Option<f64>, StoreError> {
        let now = Instant::now();
        let sets = self.sets.read().await;
        Ok(sets
            .get(key)
            .filter(|set| !set.is_expired(now))
            .and_then(|set| set.entries.first())
            .map(|(score, _)| *score))
    }

    async fn admit(&self, admission: &Admission<'_>) -> Result<bool, StoreError> {
        // Held for the whole purge/count/insert sequence.
        let mut sets = self.sets.write().await;
        Self::purge_locked(&mut sets, admission.key, admission.cutoff);

        let count = sets
            .get(admission.key)
            .map(|set| set.entries.len() as u64)
            .unwrap_or(0);
        if count >= u64::from(admission.max_requests) {
            return Ok(false);
        }

        let set = sets.entry(admission.key.to_string()).or_default();
        set.insert(admission.member, admission.score);
        set.expires_at = expiry_after(admission.ttl);
        Ok(true)
    }
}

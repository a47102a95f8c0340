//! Limiter behaviour against the concrete stores.

use std::sync::Arc;
use std::time::Duration;

use tollgate_core::SlidingWindowLimiter;
use tollgate_core::domain::{AdmissionMode, WindowPolicy};
use tollgate_core::ports::{ManualClock, RateLimiter, WindowStore};

use super::InMemoryWindowStore;

fn limiter_with_clock(
    store: Arc<dyn WindowStore>,
    max_requests: u32,
    window_secs: u64,
    clock: Arc<ManualClock>,
) -> SlidingWindowLimiter {
    let policy = WindowPolicy::per_seconds(max_requests, window_secs).unwrap();
    SlidingWindowLimiter::new(store, policy).with_clock(clock)
}

#[tokio::test]
async fn test_normal_flow_and_retry_after() {
    let clock = Arc::new(ManualClock::new(1_000.0));
    let limiter = limiter_with_clock(Arc::new(InMemoryWindowStore::new()), 3, 10, clock.clone());

    assert_eq!(limiter.retry_after("c1").await.unwrap(), None);

    for _ in 0..3 {
        assert!(limiter.is_allowed("c1").await.unwrap());
        clock.advance(0.5);
    }
    assert!(!limiter.is_allowed("c1").await.unwrap());

    // Oldest event at 1000.0 leaves the window at 1010.0; now is 1001.5.
    let retry = limiter.retry_after("c1").await.unwrap().unwrap();
    assert!(retry > Duration::ZERO && retry <= Duration::from_secs(10));
    assert!((retry.as_secs_f64() - 8.5).abs() < 1e-6);
}

#[tokio::test]
async fn test_denial_does_not_record_event() {
    let clock = Arc::new(ManualClock::new(1_000.0));
    let limiter = limiter_with_clock(Arc::new(InMemoryWindowStore::new()), 2, 10, clock.clone());

    assert!(limiter.is_allowed("c1").await.unwrap());
    assert!(limiter.is_allowed("c1").await.unwrap());
    for _ in 0..5 {
        assert!(!limiter.is_allowed("c1").await.unwrap());
        assert_eq!(limiter.request_count("c1").await.unwrap(), 2);
    }
}

#[tokio::test]
async fn test_window_slides_one_event_at_a_time() {
    let clock = Arc::new(ManualClock::new(1_000.0));
    let limiter = limiter_with_clock(Arc::new(InMemoryWindowStore::new()), 2, 10, clock.clone());

    assert!(limiter.is_allowed("c1").await.unwrap()); // t=1000
    clock.set(1_004.0);
    assert!(limiter.is_allowed("c1").await.unwrap()); // t=1004
    assert!(!limiter.is_allowed("c1").await.unwrap());

    // Exactly at the boundary the first event is out (score <= cutoff).
    clock.set(1_010.0);
    assert_eq!(limiter.request_count("c1").await.unwrap(), 1);
    assert!(limiter.is_allowed("c1").await.unwrap());
    assert!(!limiter.is_allowed("c1").await.unwrap());

    let retry = limiter.retry_after("c1").await.unwrap().unwrap();
    assert!((retry.as_secs_f64() - 4.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_window_expiry_with_real_clock() {
    let store: Arc<dyn WindowStore> = Arc::new(InMemoryWindowStore::new());
    let limiter = SlidingWindowLimiter::new(store, WindowPolicy::per_seconds(2, 1).unwrap());

    assert!(limiter.is_allowed("c1").await.unwrap());
    assert!(limiter.is_allowed("c1").await.unwrap());
    assert!(!limiter.is_allowed("c1").await.unwrap());

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert!(limiter.is_allowed("c1").await.unwrap());
}

#[tokio::test]
async fn test_request_count_tracks_admitted_events() {
    let clock = Arc::new(ManualClock::new(1_000.0));
    let limiter = limiter_with_clock(Arc::new(InMemoryWindowStore::new()), 5, 10, clock.clone());

    assert_eq!(limiter.request_count("c1").await.unwrap(), 0);

    for _ in 0..3 {
        limiter.is_allowed("c1").await.unwrap();
    }
    assert_eq!(limiter.request_count("c1").await.unwrap(), 3);

    clock.advance(10.0);
    assert_eq!(limiter.request_count("c1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_keys_are_independent() {
    let clock = Arc::new(ManualClock::new(1_000.0));
    let limiter = limiter_with_clock(Arc::new(InMemoryWindowStore::new()), 2, 10, clock);

    assert!(limiter.is_allowed("a").await.unwrap());
    assert!(limiter.is_allowed("a").await.unwrap());
    assert!(!limiter.is_allowed("a").await.unwrap());

    assert_eq!(limiter.request_count("b").await.unwrap(), 0);
    assert_eq!(limiter.retry_after("b").await.unwrap(), None);
    assert!(limiter.is_allowed("b").await.unwrap());
    assert_eq!(limiter.request_count("a").await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_client_id_is_a_valid_key() {
    let limiter = SlidingWindowLimiter::new(
        Arc::new(InMemoryWindowStore::new()),
        WindowPolicy::per_seconds(1, 10).unwrap(),
    );

    assert!(limiter.is_allowed("").await.unwrap());
    assert!(!limiter.is_allowed("").await.unwrap());
}

#[tokio::test]
async fn test_admission_refreshes_ttl() {
    let store = Arc::new(InMemoryWindowStore::new());
    let policy = WindowPolicy::per_seconds(5, 30).unwrap();
    let limiter = SlidingWindowLimiter::new(store.clone(), policy);

    limiter.is_allowed("c1").await.unwrap();

    let ttl = store.ttl("rate_limit:c1").await.unwrap();
    assert!(ttl > Duration::from_secs(59) && ttl <= Duration::from_secs(60));
}

#[tokio::test]
async fn test_same_instant_admissions_are_counted_separately() {
    // A frozen clock gives every admission the same score.
    let clock = Arc::new(ManualClock::new(1_000.0));

    for mode in [AdmissionMode::TwoStep, AdmissionMode::Atomic] {
        let store = Arc::new(InMemoryWindowStore::new());
        let limiter = limiter_with_clock(store, 4, 10, clock.clone()).with_mode(mode);
        for _ in 0..4 {
            assert!(limiter.is_allowed("c1").await.unwrap());
        }
        assert!(!limiter.is_allowed("c1").await.unwrap());
        assert_eq!(limiter.request_count("c1").await.unwrap(), 4);
    }
}

#[tokio::test]
async fn test_two_sequential_bursts_within_limit() {
    let store: Arc<dyn WindowStore> = Arc::new(InMemoryWindowStore::new());
    let limiter = Arc::new(SlidingWindowLimiter::new(
        store,
        WindowPolicy::per_seconds(10, 5).unwrap(),
    ));

    let burst = |limiter: Arc<SlidingWindowLimiter>| async move {
        let mut results = Vec::new();
        for _ in 0..5 {
            results.push(limiter.is_allowed("c1").await.unwrap());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        results
    };

    let (a, b) = tokio::join!(burst(limiter.clone()), burst(limiter.clone()));
    let allowed = a.iter().chain(b.iter()).filter(|allowed| **allowed).count();
    assert_eq!(allowed, 10);
}

async fn fire_concurrently(limiter: Arc<SlidingWindowLimiter>, checks: usize) -> usize {
    let handles: Vec<_> = (0..checks)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.is_allowed("hot").await.unwrap() })
        })
        .collect();

    futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(|allowed| *allowed)
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_step_concurrency_allows_bounded_slack() {
    let n = 20;
    let store: Arc<dyn WindowStore> = Arc::new(InMemoryWindowStore::new());
    let limiter = Arc::new(SlidingWindowLimiter::new(
        store,
        WindowPolicy::per_seconds(n, 60).unwrap(),
    ));

    let allowed = fire_concurrently(limiter.clone(), 2 * n as usize).await;
    assert!(allowed >= n as usize, "allowed {allowed} < {n}");
    assert!(allowed <= 2 * n as usize);
    assert_eq!(limiter.request_count("hot").await.unwrap(), allowed as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_atomic_concurrency_has_no_slack() {
    let n = 20;
    let store: Arc<dyn WindowStore> = Arc::new(InMemoryWindowStore::new());
    let limiter = Arc::new(
        SlidingWindowLimiter::new(store, WindowPolicy::per_seconds(n, 60).unwrap())
            .with_mode(AdmissionMode::Atomic),
    );

    let allowed = fire_concurrently(limiter.clone(), 2 * n as usize).await;
    assert_eq!(allowed, n as usize);
    assert_eq!(limiter.request_count("hot").await.unwrap(), u64::from(n));
}

#[cfg(feature = "redis")]
mod redis_backed {
    use super::*;
    use crate::store::redis::tests::get_test_store;

    async fn redis_limiter(
        max_requests: u32,
        window_secs: u64,
        mode: AdmissionMode,
    ) -> Option<SlidingWindowLimiter> {
        let store = get_test_store().await?;
        let started = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let prefix = format!("test_rate_limit:{}:{:?}", started, mode);
        Some(
            SlidingWindowLimiter::new(
                Arc::new(store),
                WindowPolicy::per_seconds(max_requests, window_secs).unwrap(),
            )
            .with_mode(mode)
            .with_key_prefix(prefix),
        )
    }

    #[tokio::test]
    async fn test_redis_normal_flow() {
        for mode in [AdmissionMode::TwoStep, AdmissionMode::Atomic] {
            let limiter = match redis_limiter(3, 10, mode).await {
                Some(l) => l,
                None => return,
            };

            for _ in 0..3 {
                assert!(limiter.is_allowed("normal").await.unwrap());
            }
            assert!(!limiter.is_allowed("normal").await.unwrap());
            assert_eq!(limiter.request_count("normal").await.unwrap(), 3);

            let retry = limiter.retry_after("normal").await.unwrap().unwrap();
            assert!(retry > Duration::ZERO && retry <= Duration::from_secs(10));
        }
    }

    #[tokio::test]
    async fn test_redis_window_expiry() {
        for mode in [AdmissionMode::TwoStep, AdmissionMode::Atomic] {
            let limiter = match redis_limiter(2, 1, mode).await {
                Some(l) => l,
                None => return,
            };

            assert!(limiter.is_allowed("expiry").await.unwrap());
            assert!(limiter.is_allowed("expiry").await.unwrap());
            assert!(!limiter.is_allowed("expiry").await.unwrap());

            tokio::time::sleep(Duration::from_millis(1100)).await;

            assert!(limiter.is_allowed("expiry").await.unwrap());
        }
    }
}

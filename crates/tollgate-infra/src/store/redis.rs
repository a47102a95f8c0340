//! Redis window store - one sorted set per key, shared by every instance.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};

use tollgate_core::StoreError;
use tollgate_core::ports::{Admission, WindowStore};

use super::RedisConfig;

// Purge, count and conditionally insert in one server-side step.
// Returns 1 if the member was added, 0 otherwise.
const ADMIT_SCRIPT: &str = r#"
local key = KEYS[1]
local cutoff = ARGV[1]
local max_requests = tonumber(ARGV[2])
local score = ARGV[3]
local member = ARGV[4]
local ttl = tonumber(ARGV[5])

redis.call('ZREMRANGEBYSCORE', key, '-inf', cutoff)
local count = redis.call('ZCARD', key)
if count < max_requests then
    redis.call('ZADD', key, score, member)
    redis.call('EXPIRE', key, ttl)
    return 1
end
return 0
"#;

/// Redis-backed window store.
///
/// Uses connection manager for automatic reconnection. Every command is
/// bounded by `command_timeout`.
pub struct RedisWindowStore {
    conn: ConnectionManager,
    config: RedisConfig,
    admit_script: Script,
}

impl RedisWindowStore {
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(config.connect_timeout))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(url = %redacted(&config.url), "Connected to Redis window store");

        Ok(Self {
            conn,
            config,
            admit_script: Script::new(ADMIT_SCRIPT),
        })
    }

    async fn run<T, F>(&self, command: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!(command, error = %e, "Redis command failed");
                Err(classify(e))
            }
            Err(_) => {
                tracing::warn!(
                    command,
                    timeout = ?self.config.command_timeout,
                    "Redis command timed out"
                );
                Err(StoreError::Timeout(self.config.command_timeout))
            }
        }
    }
}

fn classify(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Operation(e.to_string())
    }
}

/// EXPIRE takes whole seconds; never round a TTL down to zero.
fn ttl_seconds(ttl: Duration) -> i64 {
    ttl.as_secs_f64().ceil().max(1.0) as i64
}

/// Strip credentials before logging a connection URL.
fn redacted(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn purge_before(&self, key: &str, cutoff: f64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        self.run(
            "ZREMRANGEBYSCORE",
            conn.zrembyscore::<_, _, _, u64>(key, "-inf", cutoff),
        )
        .await
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        self.run("ZCARD", conn.zcard::<_, u64>(key)).await
    }

    async fn insert(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.run("ZADD", conn.zadd::<_, _, _, ()>(key, member, score)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.run("EXPIRE", conn.expire::<_, ()>(key, ttl_seconds(ttl))).await
    }

    async fn earliest(&self, key: &str) -> Result<Option<f64>, StoreError> {
        let mut conn = self.conn.clone();
        let oldest = self
            .run(
                "ZRANGE",
                conn.zrange_withscores::<_, Vec<(String, f64)>>(key, 0, 0),
            )
            .await?;
        Ok(oldest.first().map(|(_, score)| *score))
    }

    async fn admit(&self, admission: &Admission<'_>) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.admit_script.key(admission.key);
        invocation
            .arg(admission.cutoff)
            .arg(admission.max_requests)
            .arg(admission.score)
            .arg(admission.member)
            .arg(ttl_seconds(admission.ttl));

        let inserted: i64 = self.run("EVALSHA", invocation.invoke_async(&mut conn)).await?;
        Ok(inserted == 1)
    }
}

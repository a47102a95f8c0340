//! Store connection settings.

use std::time::Duration;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://:password@localhost:6379/0)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Per-command timeout
    pub command_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unavailable at startup
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_millis(500),
            fallback_to_memory: true,
        }
    }
}

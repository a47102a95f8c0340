//! Application configuration loaded from environment variables.

use std::collections::HashSet;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tollgate_core::domain::{AdmissionMode, FailurePolicy};
use tollgate_infra::RedisConfig;

/// Configuration errors - raised at startup, never per request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// Route prefix without a trailing slash, e.g. `/api/v1`.
    pub api_prefix: String,
    /// Where Prometheus metrics are served; outside `api_prefix`.
    pub metrics_path: String,
    pub request_id_header: String,
    pub rate_limit: RateLimitSettings,
    /// `None` when `REDIS_URL` is unset; limits are then per-process.
    pub redis: Option<RedisConfig>,
}

/// Limiter and middleware settings.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window: Duration,
    pub key_prefix: String,
    /// Request paths that bypass the limiter entirely (exact match).
    pub exempt_routes: HashSet<String>,
    pub mode: AdmissionMode,
    pub failure_policy: FailurePolicy,
    /// Key clients by `Forwarded`/`X-Forwarded-For` instead of the peer address.
    pub trust_forwarded: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            key_prefix: "rate_limit".to_string(),
            exempt_routes: default_exempt_routes(DEFAULT_API_PREFIX, DEFAULT_METRICS_PATH),
            mode: AdmissionMode::TwoStep,
            failure_policy: FailurePolicy::Open,
            trust_forwarded: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any name -> value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let defaults = RateLimitSettings::default();

        let api_prefix = vars
            .string("API_PREFIX", DEFAULT_API_PREFIX)
            .trim_end_matches('/')
            .to_string();
        let metrics_path = vars.string("METRICS_PATH", DEFAULT_METRICS_PATH);

        let rate_limit = RateLimitSettings {
            max_requests: vars.parse("RATE_LIMIT_MAX_REQUESTS", defaults.max_requests)?,
            window: Duration::from_secs(vars.parse("RATE_LIMIT_WINDOW_SECS", 60u64)?),
            key_prefix: vars.string("RATE_LIMIT_KEY_PREFIX", &defaults.key_prefix),
            exempt_routes: vars
                .get("RATE_LIMIT_EXEMPT_ROUTES")
                .map(|raw| parse_route_list(&raw))
                .unwrap_or_else(|| default_exempt_routes(&api_prefix, &metrics_path)),
            mode: if vars.flag("RATE_LIMIT_ATOMIC", false)? {
                AdmissionMode::Atomic
            } else {
                AdmissionMode::TwoStep
            },
            failure_policy: vars.parse("RATE_LIMIT_FAILURE_POLICY", defaults.failure_policy)?,
            trust_forwarded: vars.flag("RATE_LIMIT_TRUST_FORWARDED", false)?,
        };

        let redis = match vars.get("REDIS_URL") {
            Some(url) => {
                let defaults = RedisConfig::default();
                Some(RedisConfig {
                    url,
                    connect_timeout: Duration::from_secs(vars.parse(
                        "REDIS_CONNECT_TIMEOUT_SECS",
                        defaults.connect_timeout.as_secs(),
                    )?),
                    command_timeout: Duration::from_millis(vars.parse(
                        "REDIS_COMMAND_TIMEOUT_MS",
                        defaults.command_timeout.as_millis() as u64,
                    )?),
                    fallback_to_memory: vars
                        .flag("REDIS_FALLBACK_TO_MEMORY", defaults.fallback_to_memory)?,
                })
            }
            None => None,
        };

        Ok(Self {
            host: vars.string("HOST", "127.0.0.1"),
            port: vars.parse("PORT", 8080)?,
            environment: vars.string("APP_ENVIRONMENT", "local"),
            api_prefix,
            metrics_path,
            request_id_header: vars.string("REQUEST_ID_HEADER", "X-Request-ID"),
            rate_limit,
            redis,
        })
    }
}

/// Health check and metrics scrape bypass the limiter unless overridden.
fn default_exempt_routes(api_prefix: &str, metrics_path: &str) -> HashSet<String> {
    [format!("{}/health", api_prefix), metrics_path.to_string()]
        .into_iter()
        .collect()
}

/// Comma-separated paths; blanks are dropped.
fn parse_route_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|route| !route.is_empty())
        .map(String::from)
        .collect()
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank are treated the same.
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(name) {
            Some(value) => {
                let parsed = value.trim().parse::<T>();
                parsed.map_err(|e| ConfigError::Invalid {
                    name,
                    value,
                    reason: e.to_string(),
                })
            }
            None => Ok(default),
        }
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(name) {
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    name,
                    value,
                    reason: "expected true or false".to_string(),
                }),
            },
            None => Ok(default),
        }
    }
}

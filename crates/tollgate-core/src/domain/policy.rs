//! Window policy and the two behavioural switches around it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RateLimitError;

/// Longest accepted window. Keeps `2 × window` representable as a store TTL.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `max_requests` events per rolling `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    max_requests: u32,
    window: Duration,
}

impl WindowPolicy {
    /// Build a policy, rejecting a zero limit, an empty window or one longer
    /// than [`MAX_WINDOW`].
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, RateLimitError> {
        if max_requests == 0 {
            return Err(RateLimitError::InvalidConfiguration(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(RateLimitError::InvalidConfiguration(
                "window must be greater than zero".to_string(),
            ));
        }
        if window > MAX_WINDOW {
            return Err(RateLimitError::InvalidConfiguration(format!(
                "window must be at most {}s, got {}s",
                MAX_WINDOW.as_secs(),
                window.as_secs()
            )));
        }

        Ok(Self {
            max_requests,
            window,
        })
    }

    pub fn per_seconds(max_requests: u32, window_seconds: u64) -> Result<Self, RateLimitError> {
        Self::new(max_requests, Duration::from_secs(window_seconds))
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Idle records live for two windows before the store drops them.
    pub fn ttl(&self) -> Duration {
        self.window * 2
    }

    /// Scores at or below this value are outside the window ending at `now`.
    pub fn cutoff(&self, now: f64) -> f64 {
        now - self.window.as_secs_f64()
    }
}

/// How the read-cardinality / insert pair reaches the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdmissionMode {
    /// Separate round-trips for purge, count and insert. Concurrent callers
    /// can overshoot the limit by the number of racers.
    #[default]
    TwoStep,
    /// One store-side operation; no overshoot on a single store instance.
    Atomic,
}

/// What the HTTP layer does when the store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Admit the request.
    #[default]
    Open,
    /// Deny the request.
    Closed,
}

impl FailurePolicy {
    pub fn admits_on_error(&self) -> bool {
        matches!(self, FailurePolicy::Open)
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailurePolicy::Open),
            "closed" => Ok(FailurePolicy::Closed),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Open => write!(f, "open"),
            FailurePolicy::Closed => write!(f, "closed"),
        }
    }
}

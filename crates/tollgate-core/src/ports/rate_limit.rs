//! Rate limiting port.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::WindowPolicy;
use crate::error::RateLimitError;

/// Per-key admission gate - what the HTTP layer talks to.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Decide whether one more event for `client_id` fits in the window,
    /// recording it if so.
    async fn is_allowed(&self, client_id: &str) -> Result<bool, RateLimitError>;

    /// Time until the oldest event leaves the window, or `None` if there is
    /// capacity right now.
    async fn retry_after(&self, client_id: &str) -> Result<Option<Duration>, RateLimitError>;

    /// Events currently inside the window. For introspection only.
    async fn request_count(&self, client_id: &str) -> Result<u64, RateLimitError>;

    fn policy(&self) -> &WindowPolicy;
}

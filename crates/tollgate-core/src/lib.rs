//! # Tollgate Core
//!
//! The domain layer of Tollgate: a sliding-window admission gate over a shared
//! ordered-timestamp store. This crate has no infrastructure dependencies; the
//! store is reached only through the [`ports::WindowStore`] trait.

pub mod domain;
pub mod error;
pub mod limiter;
pub mod ports;

pub use error::{RateLimitError, StoreError};
pub use limiter::SlidingWindowLimiter;

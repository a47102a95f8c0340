//! # Tollgate Shared
//!
//! Wire types returned by the HTTP layer.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse, RateLimitExceeded};

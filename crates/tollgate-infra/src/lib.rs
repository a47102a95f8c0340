//! # Tollgate Infrastructure
//!
//! Concrete [`WindowStore`](tollgate_core::ports::WindowStore) implementations.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `redis` - Redis sorted-set store shared across instances

pub mod store;

pub use store::{InMemoryWindowStore, RedisConfig};

#[cfg(feature = "redis")]
pub use store::RedisWindowStore;

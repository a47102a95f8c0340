//! Window stores - Redis and in-memory fallback.

mod config;
mod memory;

pub use config::RedisConfig;
pub use memory::InMemoryWindowStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::RedisWindowStore;

#[cfg(test)]
mod tests;

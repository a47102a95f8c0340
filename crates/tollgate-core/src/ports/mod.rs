//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod clock;
mod rate_limit;
mod window_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::RateLimiter;
pub use window_store::{Admission, WindowStore};

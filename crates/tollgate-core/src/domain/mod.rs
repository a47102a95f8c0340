//! Domain types - the limiter's policy knobs.

mod policy;

pub use policy::{AdmissionMode, FailurePolicy, MAX_WINDOW, WindowPolicy};

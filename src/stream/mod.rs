//! Stream adapters for consuming output queues

pub mod throttle;

pub use throttle::{ThrottleBy, ThrottleExt};

//! Shared ambient layer: errors, counters, logging

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{ReadoutError, ReadoutResult};
pub use metrics::{StreamCounters, StreamStats};

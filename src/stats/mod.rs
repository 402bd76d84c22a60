//! Statistics and status reporting

pub mod metrics;

pub use metrics::{StreamCounters, StreamStats, StreamStatus};

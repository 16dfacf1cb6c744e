//! Delivery statistics

pub mod metrics;

pub use metrics::{ClientStats, MetricsSnapshot, PushMetrics};

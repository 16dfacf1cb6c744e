//! Statistics and metrics for push delivery

use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative orchestrator counters
///
/// Updated from inside the tick; read at any time through [`snapshot`].
///
/// [`snapshot`]: PushMetrics::snapshot
#[derive(Debug, Default)]
pub struct PushMetrics {
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    backoff_events: AtomicU64,
    emission_errors: AtomicU64,
    rate_limit_events: AtomicU64,
    connection_count: AtomicU64,
}

impl PushMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_frames_sent(&self, n: u64) {
        self.frames_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_frames_dropped(&self, n: u64) {
        self.frames_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_backoff_events(&self) {
        self.backoff_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_emission_errors(&self) {
        self.emission_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_rate_limit_events(&self) {
        self.rate_limit_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_connection_count(&self, n: usize) {
        self.connection_count.store(n as u64, Ordering::Relaxed);
    }

    /// Copy out the current values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            backoff_events: self.backoff_events.load(Ordering::Relaxed),
            emission_errors: self.emission_errors.load(Ordering::Relaxed),
            rate_limit_events: self.rate_limit_events.load(Ordering::Relaxed),
            connection_count: self.connection_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time orchestrator metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Frames handed to adapters (including slow sends)
    pub frames_sent: u64,
    /// Frames evicted from full connection buffers
    pub frames_dropped: u64,
    /// Flushes that grew a connection's backoff
    pub backoff_events: u64,
    /// Emitter or signing failures
    pub emission_errors: u64,
    /// Flushes cut short by an empty token bucket
    pub rate_limit_events: u64,
    /// Live connections
    pub connection_count: u64,
}

/// Per-client hub statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Messages delivered
    pub sent: u64,
    /// Log messages rejected by the client's filter
    pub filtered_out: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = PushMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_accumulate() {
        let metrics = PushMetrics::new();
        metrics.add_frames_sent(3);
        metrics.add_frames_sent(2);
        metrics.add_frames_dropped(1);
        metrics.inc_backoff_events();
        metrics.inc_emission_errors();
        metrics.inc_rate_limit_events();
        metrics.inc_rate_limit_events();
        metrics.set_connection_count(4);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                frames_sent: 5,
                frames_dropped: 1,
                backoff_events: 1,
                emission_errors: 1,
                rate_limit_events: 2,
                connection_count: 4,
            }
        );
    }

    #[test]
    fn test_connection_count_is_gauge() {
        let metrics = PushMetrics::new();
        metrics.set_connection_count(10);
        metrics.set_connection_count(2);
        assert_eq!(metrics.snapshot().connection_count, 2);
    }
}

//! Hub configuration

use std::time::Duration;

/// Log stream hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Sweep and heartbeat period
    pub heartbeat_interval: Duration,

    /// Clients not refreshed within this window are evicted
    pub client_timeout: Duration,

    /// Maximum concurrent clients (0 = unlimited)
    pub max_clients: usize,

    /// Per-client outbound channel capacity (messages)
    pub channel_capacity: usize,

    /// Capacity of the lifecycle event channel
    pub event_capacity: usize,

    /// Control messages a client may send in a burst
    pub control_burst: u32,

    /// Control message refill rate (per second)
    pub control_refill_per_sec: f64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
            max_clients: 100,
            channel_capacity: 256,
            event_capacity: 64,
            control_burst: 5,
            control_refill_per_sec: 1.0,
        }
    }
}

impl HubConfig {
    /// Set the heartbeat period
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the client timeout
    pub fn client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = timeout;
        self
    }

    /// Set maximum clients
    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Set the per-client channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the control message rate limit
    pub fn control_rate_limit(mut self, burst: u32, refill_per_sec: f64) -> Self {
        self.control_burst = burst;
        self.control_refill_per_sec = refill_per_sec;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.client_timeout, Duration::from_secs(90));
        assert_eq!(config.max_clients, 100);
        assert_eq!(config.control_burst, 5);
    }

    #[test]
    fn test_channel_capacity_floor() {
        let config = HubConfig::default().channel_capacity(0);

        assert_eq!(config.channel_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .heartbeat_interval(Duration::from_secs(5))
            .client_timeout(Duration::from_secs(15))
            .max_clients(3)
            .control_rate_limit(2, 0.5);

        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.client_timeout, Duration::from_secs(15));
        assert_eq!(config.max_clients, 3);
        assert_eq!(config.control_burst, 2);
        assert_eq!(config.control_refill_per_sec, 0.5);
    }
}

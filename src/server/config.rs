//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Push server configuration options
#[derive(Debug, Clone)]
pub struct PushServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent event streams (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// A handler must produce its response within this time
    pub request_timeout: Duration,

    /// Largest accepted request body
    pub max_request_bytes: usize,

    /// Idle time after which an event stream gets a keep-alive comment
    pub keep_alive_interval: Duration,

    /// A frame write slower than this reports `Slow`
    pub slow_threshold: Duration,

    /// A frame write slower than this fails the connection
    pub send_timeout: Duration,

    /// Per-connection outbound channel capacity (events)
    pub channel_capacity: usize,
}

impl Default for PushServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8787)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,
            request_timeout: Duration::from_secs(10),
            max_request_bytes: 8 * 1024,
            keep_alive_interval: Duration::from_secs(15),
            slow_threshold: Duration::from_millis(100),
            send_timeout: Duration::from_secs(2),
            channel_capacity: 32,
        }
    }
}

impl PushServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the largest accepted request body
    pub fn max_request_bytes(mut self, max: usize) -> Self {
        self.max_request_bytes = max;
        self
    }

    /// Set the keep-alive interval for event streams
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set the slow-write threshold
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Set the send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the per-connection channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PushServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8787);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.slow_threshold, Duration::from_millis(100));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(15));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = PushServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = PushServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .request_timeout(Duration::from_secs(5))
            .max_request_bytes(1024)
            .keep_alive_interval(Duration::from_secs(30))
            .slow_threshold(Duration::from_millis(250))
            .send_timeout(Duration::from_secs(1))
            .channel_capacity(0);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_request_bytes, 1024);
        assert_eq!(config.keep_alive_interval, Duration::from_secs(30));
        assert_eq!(config.slow_threshold, Duration::from_millis(250));
        assert_eq!(config.send_timeout, Duration::from_secs(1));
        assert_eq!(config.channel_capacity, 1);
    }
}

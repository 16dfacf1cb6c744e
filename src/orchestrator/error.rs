//! Orchestrator configuration errors

use thiserror::Error;

/// Invalid orchestrator construction
///
/// Raised synchronously from [`PushOrchestrator::new`] and never retried.
///
/// [`PushOrchestrator::new`]: super::PushOrchestrator::new
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Tick rate outside 1..=60
    #[error("fps must be within [1, 60], got {0}")]
    InvalidFps(u32),

    /// Per-tick send budget outside 1..=50
    #[error("max_frames_per_tick must be within [1, 50], got {0}")]
    InvalidMaxFramesPerTick(usize),

    /// Zero-capacity connection buffer
    #[error("buffer_capacity must be at least 1")]
    InvalidBufferCapacity,

    /// Token bucket parameters unusable
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// Backoff parameters unusable
    #[error("invalid backoff: {0}")]
    InvalidBackoff(String),

    /// The emitter registry must be sealed before scheduling
    #[error("emitter registry is not sealed")]
    RegistryNotSealed,
}

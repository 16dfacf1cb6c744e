//! Orchestrator configuration

use std::time::Duration;

use super::error::ConfigError;

/// Highest accepted tick rate
pub const MAX_FPS: u32 = 60;

/// Highest accepted per-connection send budget per tick
pub const MAX_FRAMES_PER_TICK_LIMIT: usize = 50;

/// Orchestrator configuration options
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Ticks per second
    pub fps: u32,

    /// Frames sent per connection per tick, at most
    pub max_frames_per_tick: usize,

    /// Per-connection ring buffer capacity
    pub buffer_capacity: usize,

    /// Token bucket burst size
    pub bucket_capacity: u32,

    /// Token bucket refill rate (tokens per second)
    pub refill_per_sec: f64,

    /// Backoff growth factor on a slow send
    pub backoff_multiplier: f64,

    /// Smallest non-zero backoff
    pub min_backoff_ms: u64,

    /// Backoff ceiling
    pub max_backoff_ms: u64,

    /// Upper bound for the final flush on `stop()`
    pub shutdown_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            max_frames_per_tick: 10,
            buffer_capacity: 64,
            bucket_capacity: 20,
            refill_per_sec: 20.0,
            backoff_multiplier: 2.0,
            min_backoff_ms: 100,
            max_backoff_ms: 5_000,
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

impl OrchestratorConfig {
    /// Set the tick rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the per-tick send budget
    pub fn max_frames_per_tick(mut self, max: usize) -> Self {
        self.max_frames_per_tick = max;
        self
    }

    /// Set the connection buffer capacity
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the token bucket parameters
    pub fn rate_limit(mut self, burst: u32, refill_per_sec: f64) -> Self {
        self.bucket_capacity = burst;
        self.refill_per_sec = refill_per_sec;
        self
    }

    /// Set the backoff parameters
    pub fn backoff(mut self, multiplier: f64, min_ms: u64, max_ms: u64) -> Self {
        self.backoff_multiplier = multiplier;
        self.min_backoff_ms = min_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    /// Set the shutdown flush timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Time between ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }

    /// Check every bound
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_FPS).contains(&self.fps) {
            return Err(ConfigError::InvalidFps(self.fps));
        }
        if !(1..=MAX_FRAMES_PER_TICK_LIMIT).contains(&self.max_frames_per_tick) {
            return Err(ConfigError::InvalidMaxFramesPerTick(
                self.max_frames_per_tick,
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::InvalidBufferCapacity);
        }
        if self.bucket_capacity == 0 {
            return Err(ConfigError::InvalidRateLimit("burst must be at least 1".into()));
        }
        if !self.refill_per_sec.is_finite() || self.refill_per_sec <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(format!(
                "refill rate must be positive, got {}",
                self.refill_per_sec
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoff(format!(
                "multiplier must be >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        if self.min_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(format!(
                "min {}ms exceeds max {}ms",
                self.min_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}

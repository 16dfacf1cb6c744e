//! Tick-driven push orchestration
//!
//! ```text
//!   EmitterRegistry (sealed)
//!          │ should_emit / create_frame
//!          ▼
//!   PushOrchestrator ── optional FrameSigner
//!          │ enqueue into every connection
//!          ▼
//!   ConnectionState { RingBuffer, TokenBucket, backoff }
//!          │ flush (bucket + backoff + max_frames_per_tick)
//!          ▼
//!   PushAdapter::send ──► Success | Slow | Error
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
pub mod error;
pub mod scheduler;

pub use adapter::{PushAdapter, SendOutcome};
pub use config::OrchestratorConfig;
pub use connection::ConnectionSnapshot;
pub use error::ConfigError;
pub use scheduler::{PushOrchestrator, TickReport};

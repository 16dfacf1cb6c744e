//! # pushcast
//!
//! Push-frame delivery over Server-Sent Events.
//!
//! Emitters produce small timestamped frames (heartbeats, process
//! telemetry, user-activity summaries). A tick-driven orchestrator fans them
//! out to every connection through a bounded ring buffer and a token bucket,
//! backing off from slow clients. Frames can be wrapped in HMAC-signed
//! envelopes that receivers verify with replay and clock-skew protection.
//! A separate hub streams filtered log events to viewer clients.
//!
//! ```text
//!   Emitter ──► PushOrchestrator ──(sign)──► RingBuffer ──► TokenBucket
//!                                                │ backoff
//!                                                ▼
//!                                  PushAdapter::send ──► SSE ──► ClientVerifier
//!
//!   LogEvent ──► LogStreamHub ──(filter)──► SSE ──► viewer
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pushcast::clock::system_clock;
//! use pushcast::emitter::{EmitterRegistry, HeartbeatEmitter};
//! use pushcast::hub::{HubConfig, LogStreamHub};
//! use pushcast::orchestrator::{OrchestratorConfig, PushOrchestrator};
//! use pushcast::server::{PushServer, PushServerConfig};
//!
//! # async fn example() -> pushcast::error::Result<()> {
//! let mut registry = EmitterRegistry::new();
//! registry.register(Arc::new(HeartbeatEmitter::new("hb", 5_000)))?;
//! registry.seal();
//!
//! let orchestrator = Arc::new(PushOrchestrator::new(
//!     OrchestratorConfig::default(),
//!     Arc::new(registry),
//!     system_clock(),
//! )?);
//! orchestrator.start();
//!
//! let hub = Arc::new(LogStreamHub::new(HubConfig::default(), system_clock()));
//! let server = PushServer::new(PushServerConfig::default(), orchestrator, hub);
//! server.run().await
//! # }
//! ```

pub mod client;
pub mod clock;
pub mod emitter;
pub mod error;
pub mod flow;
pub mod frame;
pub mod hub;
pub mod orchestrator;
pub mod server;
pub mod signing;
pub mod stats;
pub mod wire;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{Error, Result};
pub use frame::{OutboundFrame, PushFrame};
pub use orchestrator::{OrchestratorConfig, PushAdapter, PushOrchestrator, SendOutcome};
pub use signing::{FrameSigner, FrameVerifier, SignedFrame};

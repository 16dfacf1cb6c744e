//! Push emitters
//!
//! An emitter is a capability: it decides when it has something to say and
//! produces a [`PushFrame`]. Built-ins cover heartbeats, process telemetry
//! and user-activity summaries; anything else implements [`PushEmitter`].
//!
//! Every emitter is checked at registration: interval within
//! [`MIN_INTERVAL_MS`]..=[`MAX_INTERVAL_MS`], and a worst-case serialized
//! frame of at most [`MAX_FRAME_BYTES`]. That bounds per-tick memory and
//! network cost regardless of how many emitters are registered.

pub mod activity;
pub mod error;
pub mod heartbeat;
pub mod registry;
pub mod telemetry;

pub use activity::ActivityEmitter;
pub use error::EmitterError;
pub use heartbeat::HeartbeatEmitter;
pub use registry::{EmitterRegistry, RegistryState};
pub use telemetry::{ProcessSampler, StaticSampler, TelemetryEmitter, TelemetrySample, TelemetrySampler};

use crate::frame::PushFrame;

/// Shortest accepted emission interval
pub const MIN_INTERVAL_MS: u64 = 100;

/// Longest accepted emission interval
pub const MAX_INTERVAL_MS: u64 = 60_000;

/// Largest accepted serialized frame
pub const MAX_FRAME_BYTES: usize = 1024;

/// A source of push frames
///
/// Emitters are shared behind `Arc` once registered, so bookkeeping that
/// changes on emission uses interior mutability.
pub trait PushEmitter: Send + Sync {
    /// Globally unique id
    fn id(&self) -> &str;

    /// Minimum time between two emissions
    fn min_interval_ms(&self) -> u64;

    /// Whether the emitter has a frame to produce at `now_ms`
    fn should_emit(&self, now_ms: u64) -> bool;

    /// Produce a frame, updating emission bookkeeping
    fn create_frame(&self, now_ms: u64) -> Result<PushFrame, EmitterError>;

    /// Serialize a worst-case frame without changing any state
    ///
    /// Used at registration to enforce [`MAX_FRAME_BYTES`].
    fn serialize(&self) -> Result<String, EmitterError>;
}

/// Serialize a frame, mapping failures to [`EmitterError::SerializeFailed`]
pub(crate) fn serialize_frame(id: &str, frame: &PushFrame) -> Result<String, EmitterError> {
    frame.to_json().map_err(|e| EmitterError::SerializeFailed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Interval check shared by the built-in emitters
///
/// `last_ms == 0` means the emitter has never fired.
pub(crate) fn interval_elapsed(last_ms: u64, interval_ms: u64, now_ms: u64) -> bool {
    last_ms == 0 || now_ms.saturating_sub(last_ms) >= interval_ms
}

//! Emitter error types

use thiserror::Error;

/// Errors from emitter registration and frame creation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitterError {
    /// Registry no longer accepts registrations
    #[error("emitter registry is sealed")]
    RegistrySealed,

    /// An emitter with this id is already registered
    #[error("duplicate emitter id: {0}")]
    DuplicateId(String),

    /// Emitter id is empty
    #[error("emitter id must not be empty")]
    EmptyId,

    /// Interval outside the accepted range
    #[error("emitter {id}: min interval {interval_ms}ms outside [{min}, {max}]")]
    IntervalOutOfRange {
        id: String,
        interval_ms: u64,
        min: u64,
        max: u64,
    },

    /// Serialized frame exceeds the size limit
    #[error("emitter {id}: serialized frame is {size} bytes, limit {max}")]
    FrameTooLarge { id: String, size: usize, max: usize },

    /// `serialize()` failed during registration
    #[error("emitter {id}: serialization failed: {reason}")]
    SerializeFailed { id: String, reason: String },

    /// `create_frame()` failed during a tick
    #[error("emitter {id}: frame creation failed: {reason}")]
    CreateFailed { id: String, reason: String },
}

//! Signing error types

use thiserror::Error;

/// Errors parsing a `kid:secret,...` key specification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    /// No keys in the input
    #[error("key specification is empty")]
    Empty,

    /// An entry without a `:` separator
    #[error("malformed key entry at position {index}")]
    MalformedEntry { index: usize },

    /// Key id outside `[A-Za-z0-9_-]{4,32}`
    #[error("invalid key id: {kid:?}")]
    InvalidKeyId { kid: String },

    /// The same key id appears twice
    #[error("duplicate key id: {kid}")]
    DuplicateKeyId { kid: String },

    /// Secret is not valid base64
    #[error("secret for key {kid} is not valid base64")]
    InvalidSecret { kid: String },

    /// Secret decodes to fewer than the minimum bytes
    #[error("secret for key {kid} is {len} bytes, need at least {min}")]
    SecretTooShort { kid: String, len: usize, min: usize },

    /// Unknown algorithm name
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The active key id is not in the key set
    #[error("active key id {kid} not present in key set")]
    MissingActiveKey { kid: String },
}

/// Errors signing a frame
#[derive(Error, Debug)]
pub enum SignError {
    /// The frame could not be serialized
    #[error("frame serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The MAC rejected the key
    #[error("invalid signing key")]
    InvalidKey,
}

/// Errors verifying a signed envelope
///
/// Each failure is a distinct variant so callers can log precisely what
/// was wrong before dropping the frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Missing field, wrong type, unparseable JSON or payload
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// No secret for the envelope's key id
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    /// Envelope algorithm differs from the key's algorithm
    #[error("algorithm mismatch: expected {expected}, got {actual}")]
    AlgorithmMismatch { expected: String, actual: String },

    /// Timestamp older than the replay window
    #[error("timestamp {ts} outside replay window (now {now}, window {window_ms}ms)")]
    TimestampExpired { ts: u64, now: u64, window_ms: u64 },

    /// Timestamp deviates from local time beyond the skew tolerance
    #[error("timestamp {ts} exceeds clock skew tolerance (now {now}, tolerance {tolerance_ms}ms)")]
    ClockSkew { ts: u64, now: u64, tolerance_ms: u64 },

    /// Signature does not match
    #[error("bad signature")]
    BadSignature,

    /// The same envelope was seen before
    #[error("replayed envelope (kid {kid}, nonce {nonce})")]
    Replayed { kid: String, nonce: String },

    /// Client-side: no usable key could be obtained
    #[error("verification key unavailable: {0}")]
    KeyUnavailable(String),
}

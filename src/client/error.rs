//! Client-side key fetch errors

use thiserror::Error;

/// Failure to obtain a verification key
#[derive(Error, Debug)]
pub enum KeyFetchError {
    /// Transport failure
    #[error("key request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response
    #[error("key endpoint returned status {0}")]
    Status(u16),

    /// Response body unusable
    #[error("invalid key response: {0}")]
    InvalidResponse(String),

    /// The key arrived already expired
    #[error("key {kid} expired at {expires_at}")]
    Expired { kid: String, expires_at: u64 },

    /// A fetch was attempted too recently
    #[error("key fetch cooling down, retry in {retry_in_ms}ms")]
    Cooldown { retry_in_ms: u64 },
}

//! Hub error types

use thiserror::Error;

/// Error type for hub operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// A client with this id is already connected
    #[error("client already connected: {0}")]
    DuplicateClient(String),

    /// The hub is at capacity
    #[error("client limit reached ({0})")]
    MaxClients(usize),
}

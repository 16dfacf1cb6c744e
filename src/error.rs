//! Crate-level error type

use thiserror::Error;

use crate::client::KeyFetchError;
use crate::emitter::EmitterError;
use crate::hub::HubError;
use crate::orchestrator::ConfigError;
use crate::signing::{KeyParseError, SignError, VerifyError};

/// Any error surfaced by this crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Emitter(#[from] EmitterError),

    #[error(transparent)]
    KeyParse(#[from] KeyParseError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    KeyFetch(#[from] KeyFetchError),
}

/// Result alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn register_after_seal() -> Result<()> {
        let mut registry = crate::emitter::EmitterRegistry::new();
        registry.seal();
        registry.register(std::sync::Arc::new(crate::emitter::HeartbeatEmitter::new("hb", 1_000)))?;
        Ok(())
    }

    #[test]
    fn test_conversions() {
        let err = register_after_seal().unwrap_err();
        assert!(matches!(err, Error::Emitter(EmitterError::RegistrySealed)));

        let err: Error = HubError::MaxClients(3).into();
        assert_eq!(err.to_string(), "client limit reached (3)");
    }
}

//! Client-side envelope verification
//!
//! Same checks as the server-side verifier, but keys come from a
//! [`KeyRegistry`] and every accepted envelope is remembered in a bounded
//! replay cache.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use super::key_registry::KeyRegistry;
use crate::clock::SharedClock;
use crate::frame::PushFrame;
use crate::signing::verifier::{parse_envelope, verify_parts};
use crate::signing::{ReplayCache, SignedFrame, VerifyError, VerifyPolicy};

/// Verifies signed frames received from a push stream
pub struct ClientVerifier {
    keys: Arc<KeyRegistry>,
    policy: VerifyPolicy,
    clock: SharedClock,
    replay_cache: Mutex<ReplayCache>,
}

impl ClientVerifier {
    /// Create a verifier with default time policy
    pub fn new(keys: Arc<KeyRegistry>, clock: SharedClock) -> Self {
        Self::with_policy(keys, clock, VerifyPolicy::default())
    }

    /// Create a verifier with a custom time policy
    pub fn with_policy(keys: Arc<KeyRegistry>, clock: SharedClock, policy: VerifyPolicy) -> Self {
        let replay_cache = policy.replay_cache();
        Self {
            keys,
            policy,
            clock,
            replay_cache: Mutex::new(replay_cache),
        }
    }

    /// Verify a parsed envelope
    pub async fn verify(&self, raw: &Value) -> Result<SignedFrame, VerifyError> {
        let parts = parse_envelope(raw)?;

        let entry = match self.keys.get(&parts.kid).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return Err(VerifyError::UnknownKeyId(parts.kid)),
            Err(e) => return Err(VerifyError::KeyUnavailable(e.to_string())),
        };

        let now = self.clock.now_ms();
        let signed = verify_parts(parts, entry.algorithm, &entry.secret, &self.policy, now)?;

        let fresh = self
            .replay_cache
            .lock()
            .await
            .check_and_insert(&signed.kid, &signed.nonce, &signed.sig, now);
        if !fresh {
            return Err(VerifyError::Replayed {
                kid: signed.kid,
                nonce: signed.nonce,
            });
        }

        Ok(signed)
    }

    /// Verify raw JSON text
    pub async fn verify_str(&self, raw: &str) -> Result<SignedFrame, VerifyError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| VerifyError::Malformed(e.to_string()))?;
        self.verify(&value).await
    }

    /// Verify and unwrap, logging and dropping anything that fails
    pub async fn process(&self, raw: &str) -> Option<PushFrame> {
        match self.verify_str(raw).await {
            Ok(signed) => Some(signed.payload),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unverified frame");
                None
            }
        }
    }
}

impl std::fmt::Debug for ClientVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientVerifier")
            .field("keys", &self.keys)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

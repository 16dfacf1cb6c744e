//! HMAC frame signer
//!
//! The signed message is `kid|ts|nonce|alg|JSON(payload)`, where the payload
//! JSON is produced from a `serde_json::Value` so object keys are always
//! sorted. Verifiers re-serialize the received payload the same way.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};

use super::error::SignError;
use super::keys::{Algorithm, Secret, SigningConfig};
use crate::clock::SharedClock;
use crate::frame::PushFrame;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Nonce size in bytes (96 bits)
pub const NONCE_LEN: usize = 12;

/// A frame wrapped in a signed envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedFrame {
    /// Signing key id
    pub kid: String,
    /// Signing time, epoch milliseconds
    pub ts: u64,
    /// Base64url random nonce
    pub nonce: String,
    /// HMAC algorithm
    pub alg: Algorithm,
    /// The signed frame
    pub payload: PushFrame,
    /// Base64url HMAC digest
    pub sig: String,
}

/// Build the canonical message a signature covers
pub fn canonical_message(
    kid: &str,
    ts: u64,
    nonce: &str,
    alg: Algorithm,
    payload: &serde_json::Value,
) -> String {
    format!("{}|{}|{}|{}|{}", kid, ts, nonce, alg, payload)
}

/// Compute the raw HMAC digest of `message`
pub fn compute_mac(alg: Algorithm, secret: &Secret, message: &[u8]) -> Result<Vec<u8>, SignError> {
    match alg {
        Algorithm::HS256 => {
            let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
                .map_err(|_| SignError::InvalidKey)?;
            mac.update(message);
            Ok(mac.finalize().into_bytes().to_vec())
        }
        Algorithm::HS512 => {
            let mut mac = <HmacSha512 as Mac>::new_from_slice(secret.as_bytes())
                .map_err(|_| SignError::InvalidKey)?;
            mac.update(message);
            Ok(mac.finalize().into_bytes().to_vec())
        }
    }
}

/// Generate a fresh base64url nonce
pub fn generate_nonce() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; NONCE_LEN]>())
}

/// Signs frames with a single active key
#[derive(Debug, Clone)]
pub struct FrameSigner {
    kid: String,
    secret: Secret,
    algorithm: Algorithm,
    clock: SharedClock,
}

impl FrameSigner {
    /// Create a signer from an explicit key
    pub fn new(
        kid: impl Into<String>,
        secret: Secret,
        algorithm: Algorithm,
        clock: SharedClock,
    ) -> Self {
        Self {
            kid: kid.into(),
            secret,
            algorithm,
            clock,
        }
    }

    /// Create a signer using the config's active key
    pub fn from_config(config: &SigningConfig, clock: SharedClock) -> Option<Self> {
        let secret = config.keys.get(&config.active_kid)?.clone();
        Some(Self::new(
            config.active_kid.clone(),
            secret,
            config.algorithm,
            clock,
        ))
    }

    /// Signing key id
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Signing algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Wrap a frame in a signed envelope stamped with the current time
    pub fn sign(&self, frame: PushFrame) -> Result<SignedFrame, SignError> {
        let ts = self.clock.now_ms();
        let nonce = generate_nonce();
        let payload = serde_json::to_value(&frame)?;

        let message = canonical_message(&self.kid, ts, &nonce, self.algorithm, &payload);
        let digest = compute_mac(self.algorithm, &self.secret, message.as_bytes())?;

        Ok(SignedFrame {
            kid: self.kid.clone(),
            ts,
            nonce,
            alg: self.algorithm,
            payload: frame,
            sig: URL_SAFE_NO_PAD.encode(digest),
        })
    }
}

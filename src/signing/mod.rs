//! HMAC frame signing
//!
//! ```text
//!   PushFrame ──► FrameSigner::sign() ──► SignedFrame
//!                   kid | ts | nonce | alg | JSON(payload)
//!                               │
//!                               ▼ HMAC-SHA256 / HMAC-SHA512
//!                              sig
//!
//!   raw JSON ──► FrameVerifier::verify()
//!                  shape → kid → alg → replay window → clock skew
//!                  → signature (constant time) → payload → replay cache
//! ```

pub mod error;
pub mod keys;
pub mod replay;
pub mod signer;
pub mod verifier;

pub use error::{KeyParseError, SignError, VerifyError};
pub use keys::{Algorithm, KeySet, Secret, SigningConfig, MIN_SECRET_LEN};
pub use replay::ReplayCache;
pub use signer::{FrameSigner, SignedFrame};
pub use verifier::{FrameVerifier, VerifyPolicy};

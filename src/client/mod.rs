//! Receiving side of a signed push stream
//!
//! Fetches short-lived verification keys, verifies incoming envelopes and
//! rejects replays:
//!
//! ```text
//!   SSE data ──► ClientVerifier::process()
//!                   │ kid
//!                   ▼
//!                KeyRegistry ── missing/expired ──► KeySource (GET /keys)
//!                   │
//!                   ▼
//!                verify + replay cache ──► PushFrame
//! ```

pub mod error;
pub mod http;
pub mod key_registry;
pub mod verifier;

pub use error::KeyFetchError;
pub use http::{HttpKeySource, KeyResponse};
pub use key_registry::{KeyRegistry, KeyRegistryEntry, KeySource};
pub use verifier::ClientVerifier;

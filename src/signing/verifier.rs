//! Signed envelope verification
//!
//! Verification runs in a fixed order: shape, key id, algorithm, replay
//! window, clock skew, signature, payload, replay cache. Each step fails
//! with its own [`VerifyError`] variant.

use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use subtle::ConstantTimeEq;

use super::error::VerifyError;
use super::keys::{Algorithm, KeySet, Secret};
use super::replay::{ReplayCache, DEFAULT_REPLAY_CACHE_SIZE};
use super::signer::{canonical_message, compute_mac, SignedFrame};
use crate::clock::SharedClock;
use crate::frame::PushFrame;

/// Default replay window
pub const DEFAULT_REPLAY_WINDOW_MS: u64 = 30_000;

/// Default clock skew tolerance
pub const DEFAULT_CLOCK_SKEW_TOLERANCE_MS: u64 = 10_000;

/// Time checks applied to an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Maximum age of an envelope
    pub replay_window_ms: u64,
    /// Maximum deviation from local time, either direction
    pub clock_skew_tolerance_ms: u64,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            replay_window_ms: DEFAULT_REPLAY_WINDOW_MS,
            clock_skew_tolerance_ms: DEFAULT_CLOCK_SKEW_TOLERANCE_MS,
        }
    }
}

impl VerifyPolicy {
    /// Set the replay window
    pub fn replay_window_ms(mut self, ms: u64) -> Self {
        self.replay_window_ms = ms;
        self
    }

    /// Set the clock skew tolerance
    pub fn clock_skew_tolerance_ms(mut self, ms: u64) -> Self {
        self.clock_skew_tolerance_ms = ms;
        self
    }

    /// How long an accepted envelope can still pass [`check_time`](Self::check_time)
    ///
    /// An envelope stamped up to the skew tolerance ahead of local time stays
    /// inside the window until `ts + window`, so replay entries must outlive
    /// both.
    pub fn replay_ttl_ms(&self) -> u64 {
        self.replay_window_ms
            .saturating_add(self.clock_skew_tolerance_ms)
    }

    /// Replay cache sized for this policy
    pub(crate) fn replay_cache(&self) -> ReplayCache {
        ReplayCache::new(DEFAULT_REPLAY_CACHE_SIZE, self.replay_ttl_ms())
    }

    /// Apply the replay window and skew checks
    pub fn check_time(&self, ts: u64, now: u64) -> Result<(), VerifyError> {
        if ts.saturating_add(self.replay_window_ms) < now {
            return Err(VerifyError::TimestampExpired {
                ts,
                now,
                window_ms: self.replay_window_ms,
            });
        }

        if ts.abs_diff(now) > self.clock_skew_tolerance_ms {
            return Err(VerifyError::ClockSkew {
                ts,
                now,
                tolerance_ms: self.clock_skew_tolerance_ms,
            });
        }

        Ok(())
    }
}

/// Envelope fields after shape validation
#[derive(Debug, Clone)]
pub struct EnvelopeParts {
    pub kid: String,
    pub ts: u64,
    pub nonce: String,
    pub alg: String,
    pub payload: Value,
    pub sig: String,
}

fn string_field(obj: &serde_json::Map<String, Value>, name: &str) -> Result<String, VerifyError> {
    match obj.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(VerifyError::Malformed(format!("empty field `{}`", name))),
        Some(_) => Err(VerifyError::Malformed(format!("field `{}` must be a string", name))),
        None => Err(VerifyError::Malformed(format!("missing field `{}`", name))),
    }
}

/// Check field presence and types
pub fn parse_envelope(raw: &Value) -> Result<EnvelopeParts, VerifyError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| VerifyError::Malformed("envelope must be an object".into()))?;

    let ts = match obj.get("ts") {
        Some(v) => v
            .as_u64()
            .ok_or_else(|| VerifyError::Malformed("field `ts` must be a non-negative integer".into()))?,
        None => return Err(VerifyError::Malformed("missing field `ts`".into())),
    };

    let payload = match obj.get("payload") {
        Some(v @ Value::Object(_)) => v.clone(),
        Some(_) => return Err(VerifyError::Malformed("field `payload` must be an object".into())),
        None => return Err(VerifyError::Malformed("missing field `payload`".into())),
    };

    Ok(EnvelopeParts {
        kid: string_field(obj, "kid")?,
        ts,
        nonce: string_field(obj, "nonce")?,
        alg: string_field(obj, "alg")?,
        payload,
        sig: string_field(obj, "sig")?,
    })
}

/// Recompute the signature and compare in constant time
pub fn check_signature(parts: &EnvelopeParts, alg: Algorithm, secret: &Secret) -> Result<(), VerifyError> {
    let supplied = URL_SAFE_NO_PAD
        .decode(parts.sig.as_bytes())
        .map_err(|_| VerifyError::BadSignature)?;

    let message = canonical_message(&parts.kid, parts.ts, &parts.nonce, alg, &parts.payload);
    let expected =
        compute_mac(alg, secret, message.as_bytes()).map_err(|_| VerifyError::BadSignature)?;

    if supplied.len() != expected.len() || !bool::from(supplied.ct_eq(&expected)) {
        return Err(VerifyError::BadSignature);
    }
    Ok(())
}

/// Verify a shape-checked envelope against a known key
///
/// Shared by the server-side [`FrameVerifier`] and the client verifier.
pub fn verify_parts(
    parts: EnvelopeParts,
    expected_alg: Algorithm,
    secret: &Secret,
    policy: &VerifyPolicy,
    now: u64,
) -> Result<SignedFrame, VerifyError> {
    if parts.alg != expected_alg.as_str() {
        return Err(VerifyError::AlgorithmMismatch {
            expected: expected_alg.to_string(),
            actual: parts.alg,
        });
    }

    policy.check_time(parts.ts, now)?;
    check_signature(&parts, expected_alg, secret)?;

    let payload: PushFrame = serde_json::from_value(parts.payload)
        .map_err(|e| VerifyError::Malformed(format!("payload: {}", e)))?;

    Ok(SignedFrame {
        kid: parts.kid,
        ts: parts.ts,
        nonce: parts.nonce,
        alg: expected_alg,
        payload,
        sig: parts.sig,
    })
}

/// Server-side verifier over a static key set
#[derive(Debug)]
pub struct FrameVerifier {
    keys: KeySet,
    algorithm: Algorithm,
    policy: VerifyPolicy,
    clock: SharedClock,
    replay_cache: Option<Mutex<ReplayCache>>,
}

impl FrameVerifier {
    /// Create a verifier without replay tracking
    pub fn new(keys: KeySet, algorithm: Algorithm, clock: SharedClock) -> Self {
        Self {
            keys,
            algorithm,
            policy: VerifyPolicy::default(),
            clock,
            replay_cache: None,
        }
    }

    /// Override the time policy
    ///
    /// An enabled replay cache is rebuilt to match the new policy.
    pub fn with_policy(mut self, policy: VerifyPolicy) -> Self {
        self.policy = policy;
        if self.replay_cache.is_some() {
            self.replay_cache = Some(Mutex::new(self.policy.replay_cache()));
        }
        self
    }

    /// Reject envelopes already accepted while they could still pass the
    /// time checks
    pub fn with_replay_cache(mut self) -> Self {
        self.replay_cache = Some(Mutex::new(self.policy.replay_cache()));
        self
    }

    /// Active policy
    pub fn policy(&self) -> &VerifyPolicy {
        &self.policy
    }

    /// Verify raw JSON text
    pub fn verify_str(&self, raw: &str) -> Result<SignedFrame, VerifyError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| VerifyError::Malformed(e.to_string()))?;
        self.verify(&value)
    }

    /// Verify a parsed envelope
    pub fn verify(&self, raw: &Value) -> Result<SignedFrame, VerifyError> {
        let parts = parse_envelope(raw)?;
        let secret = self
            .keys
            .get(&parts.kid)
            .ok_or_else(|| VerifyError::UnknownKeyId(parts.kid.clone()))?;

        let now = self.clock.now_ms();
        let signed = verify_parts(parts, self.algorithm, secret, &self.policy, now)?;

        if let Some(cache) = &self.replay_cache {
            let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
            if !cache.check_and_insert(&signed.kid, &signed.nonce, &signed.sig, now) {
                return Err(VerifyError::Replayed {
                    kid: signed.kid,
                    nonce: signed.nonce,
                });
            }
        }

        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::signing::FrameSigner;

    const NOW: u64 = 1_700_000_000_000;

    fn setup(alg: Algorithm) -> (FrameSigner, FrameVerifier, ManualClock) {
        let clock = ManualClock::new(NOW);
        let mut keys = KeySet::new();
        keys.insert("key-one", Secret::new(vec![1u8; 32])).unwrap();
        keys.insert("key-two", Secret::new(vec![2u8; 48])).unwrap();

        let signer = FrameSigner::new(
            "key-one",
            Secret::new(vec![1u8; 32]),
            alg,
            Arc::new(clock.clone()),
        );
        let verifier = FrameVerifier::new(keys, alg, Arc::new(clock.clone()));
        (signer, verifier, clock)
    }

    fn signed_value(signer: &FrameSigner, frame: PushFrame) -> Value {
        serde_json::to_value(signer.sign(frame).unwrap()).unwrap()
    }

    #[test]
    fn test_sign_then_verify() {
        for alg in [Algorithm::HS256, Algorithm::HS512] {
            let (signer, verifier, _) = setup(alg);
            for frame in [
                PushFrame::heartbeat(NOW),
                PushFrame::telemetry(NOW, 37.25, 1 << 30),
                PushFrame::user_activity(NOW, json!({"click": 4, "scroll": 1})),
            ] {
                let signed = verifier.verify(&signed_value(&signer, frame.clone())).unwrap();
                assert_eq!(signed.payload, frame);
            }
        }
    }

    #[test]
    fn test_verify_from_text() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let text = serde_json::to_string(&signer.sign(PushFrame::heartbeat(1)).unwrap()).unwrap();
        assert!(verifier.verify_str(&text).is_ok());
        assert!(matches!(
            verifier.verify_str("{not json"),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_kid() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let mut value = signed_value(&signer, PushFrame::heartbeat(NOW));
        value["kid"] = json!("key-zzz");
        assert_eq!(
            verifier.verify(&value).unwrap_err(),
            VerifyError::UnknownKeyId("key-zzz".into())
        );
    }

    #[test]
    fn test_rejects_wrong_key_for_kid() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let mut value = signed_value(&signer, PushFrame::heartbeat(NOW));
        value["kid"] = json!("key-two");
        assert_eq!(verifier.verify(&value).unwrap_err(), VerifyError::BadSignature);
    }

    #[test]
    fn test_rejects_tampered_signature() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let mut value = signed_value(&signer, PushFrame::heartbeat(NOW));
        let sig = value["sig"].as_str().unwrap().to_string();
        let mut chars: Vec<char> = sig.chars().collect();
        chars[5] = if chars[5] == 'A' { 'B' } else { 'A' };
        value["sig"] = json!(chars.into_iter().collect::<String>());

        assert_eq!(verifier.verify(&value).unwrap_err(), VerifyError::BadSignature);
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let mut value = signed_value(&signer, PushFrame::telemetry(NOW, 1.0, 2));
        value["payload"]["mem"] = json!(3);
        assert_eq!(verifier.verify(&value).unwrap_err(), VerifyError::BadSignature);
    }

    #[test]
    fn test_rejects_algorithm_mismatch() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let mut value = signed_value(&signer, PushFrame::heartbeat(NOW));
        value["alg"] = json!("HS512");
        assert!(matches!(
            verifier.verify(&value),
            Err(VerifyError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_expired_timestamp() {
        let (signer, verifier, clock) = setup(Algorithm::HS256);
        let value = signed_value(&signer, PushFrame::heartbeat(NOW));
        clock.advance(DEFAULT_REPLAY_WINDOW_MS + 1);

        assert!(matches!(
            verifier.verify(&value),
            Err(VerifyError::TimestampExpired { .. })
        ));
    }

    #[test]
    fn test_rejects_future_timestamp() {
        let (signer, verifier, clock) = setup(Algorithm::HS256);
        clock.advance(DEFAULT_CLOCK_SKEW_TOLERANCE_MS + 1);
        let value = signed_value(&signer, PushFrame::heartbeat(NOW));
        clock.set(NOW);

        assert!(matches!(
            verifier.verify(&value),
            Err(VerifyError::ClockSkew { .. })
        ));
    }

    #[test]
    fn test_rejects_stale_beyond_skew_inside_window() {
        let (signer, verifier, clock) = setup(Algorithm::HS256);
        let value = signed_value(&signer, PushFrame::heartbeat(NOW));
        clock.advance(DEFAULT_CLOCK_SKEW_TOLERANCE_MS + 1);

        assert!(matches!(
            verifier.verify(&value),
            Err(VerifyError::ClockSkew { .. })
        ));
    }

    #[test]
    fn test_rejects_replay_when_cache_enabled() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let verifier = verifier.with_replay_cache();
        let value = signed_value(&signer, PushFrame::heartbeat(NOW));

        assert!(verifier.verify(&value).is_ok());
        assert!(matches!(
            verifier.verify(&value),
            Err(VerifyError::Replayed { .. })
        ));
    }

    #[test]
    fn test_replay_rejected_after_policy_widened() {
        let (signer, verifier, clock) = setup(Algorithm::HS256);
        let verifier = verifier.with_replay_cache().with_policy(
            VerifyPolicy::default()
                .replay_window_ms(120_000)
                .clock_skew_tolerance_ms(120_000),
        );
        let value = signed_value(&signer, PushFrame::heartbeat(NOW));

        assert!(verifier.verify(&value).is_ok());
        clock.advance(60_000);
        assert!(matches!(
            verifier.verify(&value),
            Err(VerifyError::Replayed { .. })
        ));
    }

    #[test]
    fn test_replay_rejected_for_future_dated_envelope() {
        let (signer, verifier, clock) = setup(Algorithm::HS256);
        let verifier = verifier
            .with_policy(
                VerifyPolicy::default()
                    .replay_window_ms(10_000)
                    .clock_skew_tolerance_ms(10_000),
            )
            .with_replay_cache();

        // Stamped at the edge of the skew tolerance
        clock.advance(10_000);
        let value = signed_value(&signer, PushFrame::heartbeat(NOW));
        clock.set(NOW);
        assert!(verifier.verify(&value).is_ok());

        // A window past acceptance, but `ts` is still inside it
        clock.advance(15_000);
        assert!(matches!(
            verifier.verify(&value),
            Err(VerifyError::Replayed { .. })
        ));
    }

    #[test]
    fn test_replay_ttl_covers_skew() {
        let policy = VerifyPolicy::default()
            .replay_window_ms(1_000)
            .clock_skew_tolerance_ms(500);
        assert_eq!(policy.replay_ttl_ms(), 1_500);
        assert_eq!(
            VerifyPolicy::default()
                .replay_window_ms(u64::MAX)
                .replay_ttl_ms(),
            u64::MAX
        );
    }

    #[test]
    fn test_replay_allowed_without_cache() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let value = signed_value(&signer, PushFrame::heartbeat(NOW));
        assert!(verifier.verify(&value).is_ok());
        assert!(verifier.verify(&value).is_ok());
    }

    #[test]
    fn test_rejects_malformed_fields() {
        let (signer, verifier, _) = setup(Algorithm::HS256);
        let good = signed_value(&signer, PushFrame::heartbeat(NOW));

        for field in ["kid", "ts", "nonce", "alg", "payload", "sig"] {
            let mut missing = good.clone();
            missing.as_object_mut().unwrap().remove(field);
            assert!(
                matches!(verifier.verify(&missing), Err(VerifyError::Malformed(_))),
                "missing {field} should be malformed"
            );
        }

        let mut wrong_type = good.clone();
        wrong_type["ts"] = json!("yesterday");
        assert!(matches!(
            verifier.verify(&wrong_type),
            Err(VerifyError::Malformed(_))
        ));

        let mut wrong_payload = good.clone();
        wrong_payload["payload"] = json!([1, 2]);
        assert!(matches!(
            verifier.verify(&wrong_payload),
            Err(VerifyError::Malformed(_))
        ));

        assert!(matches!(
            verifier.verify(&json!("string")),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[test]
    fn test_policy_check_time() {
        let policy = VerifyPolicy::default()
            .replay_window_ms(1_000)
            .clock_skew_tolerance_ms(5_000);

        assert!(policy.check_time(10_000, 10_500).is_ok());
        assert!(matches!(
            policy.check_time(10_000, 11_001),
            Err(VerifyError::TimestampExpired { .. })
        ));
        assert!(matches!(
            policy.check_time(16_001, 11_000),
            Err(VerifyError::ClockSkew { .. })
        ));
    }
}

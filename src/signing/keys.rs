//! Signing keys and key specification parsing
//!
//! Keys are configured as `"kid:base64secret,kid2:base64secret2"`. Key ids
//! must match `[A-Za-z0-9_-]{4,32}` and be unique; every secret must decode
//! to at least [`MIN_SECRET_LEN`] bytes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::error::KeyParseError;

/// Minimum decoded secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

const KID_MIN_LEN: usize = 4;
const KID_MAX_LEN: usize = 32;

/// Environment variable holding the key specification
pub const ENV_SIGNING_KEYS: &str = "PUSHCAST_SIGNING_KEYS";
/// Environment variable selecting the active key id
pub const ENV_SIGNING_KID: &str = "PUSHCAST_SIGNING_KID";
/// Environment variable selecting the algorithm
pub const ENV_SIGNING_ALG: &str = "PUSHCAST_SIGNING_ALG";

/// HMAC algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// HMAC-SHA256
    #[default]
    HS256,
    /// HMAC-SHA512
    HS512,
}

impl Algorithm {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::HS256 => "HS256",
            Algorithm::HS512 => "HS512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Algorithm::HS256),
            "HS512" => Ok(Algorithm::HS512),
            other => Err(KeyParseError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// HMAC secret bytes
///
/// `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    /// Wrap raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a base64 secret (standard or URL-safe alphabet)
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let encoded = encoded.trim();
        STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')))
            .ok()
            .map(Self)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check for an empty secret
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([{} bytes])", self.0.len())
    }
}

/// Check a key id against `[A-Za-z0-9_-]{4,32}`
pub fn is_valid_kid(kid: &str) -> bool {
    (KID_MIN_LEN..=KID_MAX_LEN).contains(&kid.len())
        && kid
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Key id → secret map
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, Secret>,
}

impl KeySet {
    /// Create an empty key set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `kid:base64secret,...` specification
    pub fn parse(spec: &str) -> Result<Self, KeyParseError> {
        let mut keys = HashMap::new();

        for (index, entry) in spec.split(',').map(str::trim).enumerate() {
            if entry.is_empty() {
                continue;
            }

            let (kid, encoded) = entry
                .split_once(':')
                .ok_or(KeyParseError::MalformedEntry { index })?;
            let kid = kid.trim();

            if !is_valid_kid(kid) {
                return Err(KeyParseError::InvalidKeyId {
                    kid: kid.to_string(),
                });
            }
            if keys.contains_key(kid) {
                return Err(KeyParseError::DuplicateKeyId {
                    kid: kid.to_string(),
                });
            }

            let secret =
                Secret::from_base64(encoded).ok_or_else(|| KeyParseError::InvalidSecret {
                    kid: kid.to_string(),
                })?;
            if secret.len() < MIN_SECRET_LEN {
                return Err(KeyParseError::SecretTooShort {
                    kid: kid.to_string(),
                    len: secret.len(),
                    min: MIN_SECRET_LEN,
                });
            }

            keys.insert(kid.to_string(), secret);
        }

        if keys.is_empty() {
            return Err(KeyParseError::Empty);
        }

        Ok(Self { keys })
    }

    /// Add a key, validating it like the parser does
    pub fn insert(&mut self, kid: impl Into<String>, secret: Secret) -> Result<(), KeyParseError> {
        let kid = kid.into();
        if !is_valid_kid(&kid) {
            return Err(KeyParseError::InvalidKeyId { kid });
        }
        if self.keys.contains_key(&kid) {
            return Err(KeyParseError::DuplicateKeyId { kid });
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(KeyParseError::SecretTooShort {
                kid,
                len: secret.len(),
                min: MIN_SECRET_LEN,
            });
        }
        self.keys.insert(kid, secret);
        Ok(())
    }

    /// Look up a secret
    pub fn get(&self, kid: &str) -> Option<&Secret> {
        self.keys.get(kid)
    }

    /// Check if a key id is present
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check for an empty set
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key ids, sorted
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }
}

/// Signing configuration
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// All known keys
    pub keys: KeySet,
    /// Key id used for signing
    pub active_kid: String,
    /// HMAC algorithm
    pub algorithm: Algorithm,
}

impl SigningConfig {
    /// Build a config, checking the active key is present
    pub fn new(
        keys: KeySet,
        active_kid: impl Into<String>,
        algorithm: Algorithm,
    ) -> Result<Self, KeyParseError> {
        let active_kid = active_kid.into();
        if !keys.contains(&active_kid) {
            return Err(KeyParseError::MissingActiveKey { kid: active_kid });
        }
        Ok(Self {
            keys,
            active_kid,
            algorithm,
        })
    }

    /// Load from `PUSHCAST_SIGNING_*` environment variables
    ///
    /// Returns `Ok(None)` when no keys are configured. Without an explicit
    /// `PUSHCAST_SIGNING_KID`, the first key id in sorted order is active.
    pub fn from_env() -> Result<Option<Self>, KeyParseError> {
        let Ok(spec) = std::env::var(ENV_SIGNING_KEYS) else {
            return Ok(None);
        };
        if spec.trim().is_empty() {
            return Ok(None);
        }

        let keys = KeySet::parse(&spec)?;
        let algorithm = match std::env::var(ENV_SIGNING_ALG) {
            Ok(alg) => alg.trim().parse()?,
            Err(_) => Algorithm::default(),
        };
        let active_kid = match std::env::var(ENV_SIGNING_KID) {
            Ok(kid) => kid.trim().to_string(),
            Err(_) => keys.kids().first().map(|k| k.to_string()).unwrap_or_default(),
        };

        Self::new(keys, active_kid, algorithm).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(len: usize) -> String {
        STANDARD.encode(vec![0xA5u8; len])
    }

    #[test]
    fn test_parse_multiple_keys() {
        let spec = format!("primary:{}, backup_2:{}", b64(32), b64(64));
        let keys = KeySet::parse(&spec).unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(keys.kids(), vec!["backup_2", "primary"]);
        assert_eq!(keys.get("backup_2").unwrap().len(), 64);
    }

    #[test]
    fn test_parse_rejects_short_secret() {
        let spec = format!("short:{}", b64(31));
        assert_eq!(
            KeySet::parse(&spec).unwrap_err(),
            KeyParseError::SecretTooShort {
                kid: "short".into(),
                len: 31,
                min: 32
            }
        );
    }

    #[test]
    fn test_parse_rejects_duplicate_kid() {
        let spec = format!("key1:{},key1:{}", b64(32), b64(32));
        assert!(matches!(
            KeySet::parse(&spec),
            Err(KeyParseError::DuplicateKeyId { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_kid() {
        let too_long = "k".repeat(33);
        for kid in ["abc", "has space", "dots.not.ok", too_long.as_str()] {
            let spec = format!("{}:{}", kid, b64(32));
            assert!(
                matches!(KeySet::parse(&spec), Err(KeyParseError::InvalidKeyId { .. })),
                "kid {kid:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(KeySet::parse("").unwrap_err(), KeyParseError::Empty);
        assert_eq!(KeySet::parse(" , ").unwrap_err(), KeyParseError::Empty);
        assert_eq!(
            KeySet::parse("nocolon").unwrap_err(),
            KeyParseError::MalformedEntry { index: 0 }
        );
        assert!(matches!(
            KeySet::parse("goodkid:!!!not-base64!!!"),
            Err(KeyParseError::InvalidSecret { .. })
        ));
    }

    #[test]
    fn test_url_safe_secret_accepted() {
        let encoded = URL_SAFE_NO_PAD.encode([0xFBu8; 40]);
        let keys = KeySet::parse(&format!("urlsafe:{}", encoded)).unwrap();
        assert_eq!(keys.get("urlsafe").unwrap().as_bytes(), &[0xFBu8; 40]);
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("HS512".parse::<Algorithm>().unwrap(), Algorithm::HS512);
        assert!("RS256".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new(b"super-secret-value".to_vec());
        assert_eq!(format!("{:?}", secret), "Secret([18 bytes])");
    }

    #[test]
    fn test_signing_config_requires_active_key() {
        let keys = KeySet::parse(&format!("key1:{}", b64(32))).unwrap();
        assert!(SigningConfig::new(keys.clone(), "key1", Algorithm::HS256).is_ok());
        assert_eq!(
            SigningConfig::new(keys, "missing", Algorithm::HS256).unwrap_err(),
            KeyParseError::MissingActiveKey {
                kid: "missing".into()
            }
        );
    }
}

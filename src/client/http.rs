//! HTTP key source
//!
//! `GET {base}/keys` returning
//! `{"kid": "...", "secret": "<base64>", "algorithm": "HS256", "expiresAt": 1700000000000}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::KeyFetchError;
use super::key_registry::{KeyRegistryEntry, KeySource};
use crate::signing::{Algorithm, Secret, MIN_SECRET_LEN};

/// Key endpoint response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResponse {
    pub kid: String,
    pub secret: String,
    pub algorithm: String,
    pub expires_at: u64,
}

impl KeyResponse {
    /// Decode and validate into a registry entry
    pub fn into_entry(self) -> Result<KeyRegistryEntry, KeyFetchError> {
        if self.kid.is_empty() {
            return Err(KeyFetchError::InvalidResponse("empty kid".into()));
        }

        let secret = Secret::from_base64(&self.secret).ok_or_else(|| {
            KeyFetchError::InvalidResponse(format!("secret for {} is not base64", self.kid))
        })?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(KeyFetchError::InvalidResponse(format!(
                "secret for {} is {} bytes, need {}",
                self.kid,
                secret.len(),
                MIN_SECRET_LEN
            )));
        }

        let algorithm: Algorithm = self
            .algorithm
            .parse()
            .map_err(|e: crate::signing::KeyParseError| KeyFetchError::InvalidResponse(e.to_string()))?;

        Ok(KeyRegistryEntry {
            kid: self.kid,
            secret,
            algorithm,
            expires_at: self.expires_at,
        })
    }
}

/// Fetches keys from an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    /// Create a source for `{base_url}/keys`
    pub fn new(base_url: &str) -> Result<Self, KeyFetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a source using an existing client
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/keys", base_url.trim_end_matches('/')),
        }
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<KeyRegistryEntry, KeyFetchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        let body: KeyResponse = response.json().await?;
        body.into_entry()
    }
}

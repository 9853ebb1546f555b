//! Playable URL resolution for catalog sources.
//!
//! Sources are either absolute `http(s)` URLs, which play as-is, or storage
//! references that must be exchanged for a short-lived signed URL.

use crate::config::StorageConfig;
use crate::error::{ReelError, Result};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Response keys that may carry the signed URL.
const SIGNED_URL_KEYS: &[&str] = &["signed_url", "signedURL", "signedUrl", "url"];

/// Exchanges a storage reference for a time-limited URL.
#[async_trait]
pub trait VideoStorage: Send + Sync {
    async fn signed_url(&self, reference: &str, ttl: Duration) -> Result<String>;
}

/// Absolute `http`/`https` URL, if `source` is one.
#[must_use]
pub fn absolute_http_url(source: &str) -> Option<Url> {
    Url::parse(source.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Resolve a catalog source into something the player can load.
///
/// # Errors
///
/// Returns [`ReelError::Storage`] if signing fails.
pub async fn playable_url(storage: &dyn VideoStorage, source: &str, ttl: Duration) -> Result<String> {
    if let Some(url) = absolute_http_url(source) {
        return Ok(url.to_string());
    }
    storage.signed_url(source.trim(), ttl).await
}

/// Storage without a signing backend: only absolute URLs are playable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSigningStorage;

#[async_trait]
impl VideoStorage for NoSigningStorage {
    async fn signed_url(&self, reference: &str, _ttl: Duration) -> Result<String> {
        Err(ReelError::Storage(format!(
            "no signing endpoint configured for {reference}"
        )))
    }
}

/// Requests signed URLs from an HTTP endpoint.
///
/// Sends `POST {"path": reference, "expires_in": secs}` and reads the URL
/// from the JSON response. Relative results are joined onto the endpoint.
#[derive(Debug, Clone)]
pub struct HttpSigningStorage {
    endpoint: Url,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpSigningStorage {
    /// # Errors
    ///
    /// Returns [`ReelError::Config`] if `endpoint` is not a valid URL.
    pub fn new(endpoint: &str, auth_token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| ReelError::Config(format!("invalid signed_url_endpoint {endpoint}: {e}")))?;
        Ok(Self {
            endpoint,
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
            client: reqwest::Client::new(),
        })
    }

    /// Build from config; `None` when no endpoint is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ReelError::Config`] for an invalid endpoint.
    pub fn from_config(config: &StorageConfig) -> Result<Option<Self>> {
        match config.signed_url_endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => {
                Self::new(endpoint, config.auth_token.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl VideoStorage for HttpSigningStorage {
    async fn signed_url(&self, reference: &str, ttl: Duration) -> Result<String> {
        let body = serde_json::json!({
            "path": reference,
            "expires_in": ttl.as_secs(),
        });
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ReelError::Storage(format!("signing request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReelError::Storage(format!(
                "signing failed ({status}): {body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReelError::Storage(format!("invalid signing response: {e}")))?;
        let signed = SIGNED_URL_KEYS
            .iter()
            .find_map(|key| json.get(*key).and_then(serde_json::Value::as_str))
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ReelError::Storage("signing response has no URL".into()))?;

        if let Some(url) = absolute_http_url(signed) {
            return Ok(url.to_string());
        }
        self.endpoint
            .join(signed.trim())
            .map(|url| url.to_string())
            .map_err(|e| ReelError::Storage(format!("invalid signed URL {signed}: {e}")))
    }
}

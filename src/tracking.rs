//! Fire-and-forget usage tracking for `fetch_video`.

use crate::config::TrackingConfig;
use crate::error::{ReelError, Result};
use async_trait::async_trait;
use serde::Serialize;
use url::Url;

/// What gets recorded when a video is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRecord {
    pub event: &'static str,
    pub title: String,
    pub index: usize,
    pub event_id: String,
}

impl FetchRecord {
    #[must_use]
    pub fn new(title: impl Into<String>, index: usize) -> Self {
        Self {
            event: "fetch_video",
            title: title.into(),
            index,
            event_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
pub trait Tracker: Send + Sync {
    async fn record_fetch(&self, record: &FetchRecord) -> Result<()>;
}

/// Tracker that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

#[async_trait]
impl Tracker for NoopTracker {
    async fn record_fetch(&self, record: &FetchRecord) -> Result<()> {
        tracing::trace!(title = %record.title, "tracking disabled");
        Ok(())
    }
}

/// Posts each record as JSON to a configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpTracker {
    endpoint: Url,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpTracker {
    /// # Errors
    ///
    /// Returns [`ReelError::Config`] if `endpoint` is not a valid URL.
    pub fn new(endpoint: &str, auth_token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| ReelError::Config(format!("invalid tracking endpoint {endpoint}: {e}")))?;
        Ok(Self {
            endpoint,
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
            client: reqwest::Client::new(),
        })
    }

    /// # Errors
    ///
    /// Returns [`ReelError::Config`] for an invalid endpoint.
    pub fn from_config(config: &TrackingConfig) -> Result<Option<Self>> {
        match config.endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => {
                Self::new(endpoint, config.auth_token.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl Tracker for HttpTracker {
    async fn record_fetch(&self, record: &FetchRecord) -> Result<()> {
        let mut request = self.client.post(self.endpoint.clone()).json(record);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ReelError::Tracking(format!("tracking request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReelError::Tracking(format!(
                "tracking failed ({status}): {body}"
            )));
        }
        Ok(())
    }
}

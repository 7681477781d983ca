//! HTTP detection store

use crate::{DetectionRecord, DetectionStore, StorageError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Posts detection records to a backend's `/detect` endpoint
pub struct HttpDetectionStore {
    client: reqwest::Client,
    url: String,
    auth_token: String,
}

impl HttpDetectionStore {
    /// `base_url` is the API root, e.g. `http://localhost:5000/api`
    pub fn new(base_url: &str, auth_token: impl Into<String>) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StorageError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/detect", base_url.trim_end_matches('/')),
            auth_token: auth_token.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DetectionStore for HttpDetectionStore {
    async fn save_detection(&self, record: DetectionRecord) -> Result<(), StorageError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.auth_token)
            .json(&record)
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Rejected(status.as_u16()));
        }
        debug!("Detection saved to {}", self.url);
        Ok(())
    }
}

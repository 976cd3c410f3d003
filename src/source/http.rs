//! HTTP implementation of the video source

use crate::player::PlaylistEntry;
use crate::source::{parse_video_url, SourceProvider};
use crate::utils::config::ApiConfig;
use crate::utils::error::FetchError;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Fetches entries from a JSON endpoint
///
/// Requests run on a shared tokio runtime and are awaited in place, so a
/// fetch blocks the calling loop until it completes or times out.
pub struct HttpSource {
    client: reqwest::Client,
    runtime: Arc<Runtime>,
    endpoint: String,
    url_field: String,
}

impl HttpSource {
    pub fn new(config: &ApiConfig, runtime: Arc<Runtime>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("randplay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            runtime,
            endpoint: config.endpoint.clone(),
            url_field: config.url_field.clone(),
        })
    }

    async fn request(&self) -> Result<PlaylistEntry, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::BadResponse(format!("HTTP status: {}", response.status())));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FetchError::BadResponse(e.to_string()))?;

        parse_video_url(&body, &self.url_field)
    }
}

impl SourceProvider for HttpSource {
    fn fetch_one(&mut self) -> Result<PlaylistEntry, FetchError> {
        debug!("Requesting video from {}", self.endpoint);
        let entry = self.runtime.block_on(self.request())?;
        info!("Fetched video {}", entry);
        Ok(entry)
    }
}

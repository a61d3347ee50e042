//! HTTP list fetching.
//! Gated behind the "fetch" feature flag.

use crate::error::{ConfigError, FetchFailure};
use crate::source::{decode_list, Endpoint, RefSource, RemoteItem};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::time::Duration;

pub use crate::config::FetchConfig;

/// `RefSource` backed by a real HTTP client. One GET per fetch, no retries.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_config(&FetchConfig::default())
    }

    pub fn with_config(config: &FetchConfig) -> Result<Self, ConfigError> {
        // GitHub rejects API requests without a User-Agent
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RefSource for HttpSource {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<RemoteItem>, FetchFailure> {
        tracing::debug!(url = %endpoint, "fetching ref list");

        let response = self
            .client
            .get(endpoint.url().as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string());
            return Err(FetchFailure::error(reason));
        }

        let body = response.bytes().await.map_err(transport_failure)?;
        let items = decode_list(&body, endpoint.shape())?;
        tracing::debug!(url = %endpoint, count = items.len(), "ref list decoded");
        Ok(items)
    }
}

fn transport_failure(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::timeout(e.to_string())
    } else {
        FetchFailure::error(e.to_string())
    }
}

//! go2rtc REST API Client
//!
//! HTTP client for fetching the stream status payload.

use serde_json::Value;
use thiserror::Error;

use crate::config::Go2rtcConfig;

/// go2rtc streams API client
pub struct Go2rtcClient {
    client: reqwest::Client,
    api_url: String,
}

impl Go2rtcClient {
    /// Create a new client with the configured request timeout
    pub fn new(config: &Go2rtcConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: config.api_url.clone(),
        }
    }

    /// Fetch the current stream status payload.
    ///
    /// The payload is kept as raw JSON; field-level tolerance for missing or
    /// odd data is the extractor's job, not the transport's.
    pub async fn fetch_streams(&self) -> Result<Value, Go2rtcError> {
        let response = self
            .client
            .get(&self.api_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Go2rtcError::Timeout
                } else if e.is_connect() {
                    Go2rtcError::Unavailable
                } else {
                    Go2rtcError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(Go2rtcError::Api {
                status: response.status().as_u16(),
            });
        }

        response.json().await.map_err(Go2rtcError::Request)
    }
}

/// Errors that can occur when talking to go2rtc
#[derive(Error, Debug)]
pub enum Go2rtcError {
    #[error("go2rtc unreachable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("API returned status {status}")]
    Api { status: u16 },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

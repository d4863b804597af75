//! reqwest-backed transport with fixed credentials

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{Transport, TransportError};
use crate::config::BooruConfig;
use crate::domain::Request;

/// HTTP session shared by every request for the life of the process
///
/// Authentication and the identifying user agent are fixed at construction
/// and attached to every call.
pub struct HttpTransport {
    http: Client,
    username: String,
    api_key: String,
}

impl HttpTransport {
    /// Build the session from configuration
    ///
    /// Reads the credentials from the environment variables named in config.
    pub fn from_config(config: &BooruConfig) -> eyre::Result<Self> {
        debug!(base_url = %config.base_url, "HttpTransport::from_config: called");
        let (username, api_key) = config.credentials()?;
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            username,
            api_key,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Value, TransportError> {
        debug!(%request, "HttpTransport::execute: called");
        let response = self
            .http
            .get(request.target())
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "HttpTransport::execute: non-success status");
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let value = serde_json::from_str(&body)?;
        debug!(bytes = body.len(), "HttpTransport::execute: success");
        Ok(value)
    }
}

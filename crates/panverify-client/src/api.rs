//! Single-attempt access to the verification service.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use panverify_core::{Pan, ServiceConfig};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Request};
use serde::Serialize;

/// One round trip to the verification service.
///
/// Implementations make exactly one attempt and return the raw 2xx body.
/// Retrying and interpretation live in [`crate::PanVerifier`].
#[async_trait]
pub trait PanApi: Send + Sync {
    /// Ask the service about `pan`.
    async fn check(&self, pan: &Pan) -> Result<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest<'a> {
    service_name: &'a str,
    user_id: &'a str,
}

/// HTTP implementation of [`PanApi`].
#[derive(Debug, Clone)]
pub struct HttpPanApi {
    client: Client,
    config: ServiceConfig,
}

impl HttpPanApi {
    /// Create a client with the configured timeout and user agent.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Use a preconfigured client, e.g. one with custom proxy settings.
    #[must_use]
    pub fn with_client(client: Client, config: ServiceConfig) -> Self {
        Self { client, config }
    }

    /// Service settings in use.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Build the POST request for `pan` without sending it.
    pub fn build_request(&self, pan: &Pan) -> Result<Request> {
        self.client
            .post(&self.config.url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header("sn", self.config.service_name.as_str())
            .header("priority", "u=0")
            .json(&CheckRequest {
                service_name: &self.config.service_name,
                user_id: pan.as_str(),
            })
            .build()
            .map_err(|e| self.classify(&e))
    }

    fn classify(&self, error: &reqwest::Error) -> ClientError {
        if error.is_timeout() {
            ClientError::Timeout {
                seconds: self.config.timeout_secs,
            }
        } else {
            ClientError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl PanApi for HttpPanApi {
    async fn check(&self, pan: &Pan) -> Result<String> {
        let request = self.build_request(pan)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| self.classify(&e))
    }
}

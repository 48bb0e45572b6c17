use super::types::{MessageRequest, MessageResponse};
use crate::domain::errors::ApiError;
use crate::domain::models::ApiConfig;
use crate::domain::ports::{Completion, CompletionClient, CompletionRequest};
use crate::infrastructure::logging::scrub_secrets;
use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, Response};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Anthropic API version sent with every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for the Claude HTTP client
#[derive(Clone)]
pub struct ClaudeClientConfig {
    /// Anthropic API key
    pub api_key: String,

    /// Base URL for the Claude API
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClaudeClientConfig {
    pub fn from_api_config(api: &ApiConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: api.base_url.trim_end_matches('/').to_string(),
            timeout_secs: api.timeout_secs,
        }
    }

    /// API key safe to print.
    fn scrubbed_key(&self) -> String {
        match self.api_key.get(..8) {
            Some(prefix) if self.api_key.len() > 8 => format!("{prefix}...[REDACTED]"),
            _ => "[REDACTED]".to_string(),
        }
    }
}

impl std::fmt::Debug for ClaudeClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeClientConfig")
            .field("api_key", &self.scrubbed_key())
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// HTTP client for the Messages API
///
/// One instance is one client slot of the execution pool. It performs a
/// single request per call; retry and rate limiting are applied by the pool.
pub struct ClaudeClient {
    http_client: ReqwestClient,
    base_url: String,
}

impl ClaudeClient {
    /// Create a new Claude API client
    ///
    /// # Returns
    /// * `Result<Self, ApiError>` - Client instance or error
    pub fn new(config: ClaudeClientConfig) -> Result<Self, ApiError> {
        debug!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            api_key = %config.scrubbed_key(),
            "initializing Claude API client"
        );

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            header::HeaderValue::from_str(&config.api_key)
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid API key: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .tcp_nodelay(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url,
        })
    }

    /// Send a message request and get a response
    #[instrument(skip(self, request), fields(model = %request.model, max_tokens = request.max_tokens))]
    pub async fn send_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ApiError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!("POST {}", url);

        let response = self.http_client.post(&url).json(request).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> Result<MessageResponse, ApiError> {
        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(self.handle_error_response(response).await);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Classify an error response by status code
    async fn handle_error_response(&self, response: Response) -> ApiError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());

        warn!(status = status.as_u16(), body = %scrub_secrets(&body), "API error");

        ApiError::from_status(status.as_u16(), body)
    }
}

#[async_trait]
impl CompletionClient for ClaudeClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ApiError> {
        let response = self.send_message(&MessageRequest::from(&request)).await?;
        Ok(response.into())
    }
}

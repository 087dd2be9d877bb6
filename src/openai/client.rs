use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::error::OpenAiError;
use super::types::{ResponsesRequest, ResponsesResponse};
use crate::config::IngestConfig;
use crate::pipeline::{CallError, GenerativeClient};

pub const API_URL: &str = "https://api.openai.com/v1/responses";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Client for the OpenAI Responses API.
///
/// Holds a single `reqwest::Client`, whose connection pool is shared by every
/// pipeline run that borrows this client.
pub struct OpenAiClient {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Result<Self, OpenAiError> {
        Self::with_base_url(api_key, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, OpenAiError> {
        Self::build(
            api_key,
            DEFAULT_MODEL.to_string(),
            base_url,
            Duration::from_secs(10),
            Duration::from_secs(120),
        )
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, OpenAiError> {
        Self::build(
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn build(
        api_key: String,
        model: String,
        base_url: String,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, OpenAiError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key,
            model,
            client,
            base_url,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn create_response(
        &self,
        req: &ResponsesRequest,
    ) -> Result<ResponsesResponse, OpenAiError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .map_err(OpenAiError::from_transport)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            return Err(OpenAiError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(OpenAiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .json::<ResponsesResponse>()
            .await
            .map_err(OpenAiError::from_transport)?;
        debug!(
            response_id = %body.id,
            output_tokens = body.usage.as_ref().map(|u| u.output_tokens).unwrap_or(0),
            "responses call finished"
        );
        Ok(body)
    }
}

#[async_trait]
impl GenerativeClient for OpenAiClient {
    async fn call(&self, instructions: &str, input: &str) -> Result<String, CallError> {
        let req = ResponsesRequest {
            model: self.model.clone(),
            instructions: instructions.to_string(),
            input: input.to_string(),
        };
        let text = self.create_response(&req).await?.output_text();
        if text.trim().is_empty() {
            return Err(OpenAiError::EmptyOutput.into());
        }
        Ok(text)
    }
}

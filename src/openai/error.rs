//! Error types for the OpenAI Responses client.

use thiserror::Error;

/// Errors raised while talking to the Responses endpoint.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// HTTP 429. `retry_after_ms` comes from the `retry-after` header when present.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success status, with the response body as message.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request did not finish within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The response parsed but carried no output text.
    #[error("response contained no output text")]
    EmptyOutput,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl OpenAiError {
    /// Classify a transport error, keeping timeouts distinct.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OpenAiError::Timeout
        } else {
            OpenAiError::NetworkError(err)
        }
    }
}

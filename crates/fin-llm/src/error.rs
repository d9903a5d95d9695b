//! Error types for model calls

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

#[derive(Error, Debug)]
pub enum LLMError {
    /// Call failed for a reason with no dedicated variant
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("API key rejected")]
    AuthenticationFailed,

    /// Per-minute rate or daily quota exhausted
    #[error("Rate limit or quota exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    /// The model declined to produce content (safety block, empty candidate list)
    #[error("No content generated: {0}")]
    EmptyResponse(String),

    #[cfg(feature = "gemini")]
    #[error("HTTP transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Classify a non-success HTTP status returned for `model`
    pub fn from_status(status: u16, body: String, model: &str) -> Self {
        match status {
            401 | 403 => LLMError::AuthenticationFailed,
            429 => LLMError::RateLimitExceeded(body),
            400 => LLMError::InvalidRequest(body),
            404 => LLMError::ModelNotFound(model.to_string()),
            _ => LLMError::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }
}

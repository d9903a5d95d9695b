//! Error types for stock analysis operations

use std::time::Duration;
use thiserror::Error;

/// User-facing error categories
///
/// Every [`StockError`] collapses into one of these when it is surfaced as a
/// notice. None of them is fatal to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty ticker or out-of-range parameter
    InvalidInput,
    /// The market-data provider returned nothing or failed
    DataUnavailable,
    /// The search API failed or no key was supplied
    NewsUnavailable,
    /// No AI key, or the generative-AI call failed
    AiUnavailable,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::DataUnavailable => "DataUnavailable",
            ErrorKind::NewsUnavailable => "NewsUnavailable",
            ErrorKind::AiUnavailable => "AIUnavailable",
        };
        f.write_str(s)
    }
}

/// Stock analysis specific errors
#[derive(Debug, Error)]
pub enum StockError {
    /// Rejected user input (empty ticker, bad period, parameter out of range)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// External news search failed or was skipped
    #[error("News search unavailable: {0}")]
    NewsUnavailable(String),

    /// Generative-AI analysis failed or was skipped
    #[error("AI analysis unavailable: {0}")]
    AiUnavailable(String),

    /// An external call exceeded its time budget
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// Prompt template error
    #[error("Prompt error: {0}")]
    PromptError(#[from] minijinja::Error),

    /// Generative-AI provider error
    #[error("LLM error: {0}")]
    LlmError(#[from] fin_llm::LLMError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Terminal command error
    #[error("Command error: {0}")]
    CommandError(String),
}

impl StockError {
    /// Create a `DataUnavailable` error
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// The user-facing category this error is reported under
    ///
    /// Transport-level failures are classified by the component that raised
    /// them, so a network error from the AI provider arrives here already
    /// wrapped as `AiUnavailable`; unwrapped ones default to `DataUnavailable`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::InvalidInput(_)
            | StockError::ConfigError(_)
            | StockError::CommandError(_)
            | StockError::IndicatorError(_) => ErrorKind::InvalidInput,
            StockError::NewsUnavailable(_) => ErrorKind::NewsUnavailable,
            StockError::AiUnavailable(_)
            | StockError::LlmError(_)
            | StockError::PromptError(_) => ErrorKind::AiUnavailable,
            StockError::DataUnavailable { .. }
            | StockError::Timeout { .. }
            | StockError::ApiError(_)
            | StockError::RateLimitExceeded { .. }
            | StockError::NetworkError(_)
            | StockError::JsonError(_)
            | StockError::YahooFinanceError(_) => ErrorKind::DataUnavailable,
        }
    }
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

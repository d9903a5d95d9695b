//! Configuration for stock analysis operations

use crate::api::SearchLocale;
use crate::error::{Result, StockError};
use crate::market::Period;
use crate::prompts::Language;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the analysis pipeline
///
/// API keys are not part of it; they are supplied per session and live only
/// in [`crate::session::ApiKeys`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Period selected when the user has not picked one
    pub default_period: Period,

    /// Timeout for each market-data and search call
    pub request_timeout: Duration,

    /// Timeout for each generative-AI call
    pub ai_timeout: Duration,

    /// Generative model identifier
    pub model: String,

    /// Maximum tokens the model may generate per reply
    pub max_output_tokens: usize,

    /// Sampling temperature, provider default when `None`
    pub temperature: Option<f32>,

    /// Number of recent chat messages resent with each follow-up
    pub chat_window: usize,

    /// Provider-native headlines requested per fetch
    pub provider_news_count: usize,

    /// Results requested from the search API
    pub search_results: usize,

    /// Headlines per source included in the initial prompt
    pub prompt_news_limit: usize,

    /// Search API requests allowed per minute
    pub search_rate_limit: u32,

    /// Language and country the search API localizes results for
    pub search_locale: SearchLocale,

    /// Language of the analysis prompt and the model's answer
    pub language: Language,

    /// Yahoo Finance query host
    pub yahoo_base_url: String,

    /// SerpAPI host
    pub serpapi_base_url: String,

    /// Gemini REST base URL
    pub gemini_api_base: String,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            default_period: Period::TwoYears,
            request_timeout: Duration::from_secs(20),
            ai_timeout: Duration::from_secs(120),
            model: "gemini-1.5-flash-latest".to_string(),
            max_output_tokens: 4096,
            temperature: None,
            chat_window: 20,
            provider_news_count: 10,
            search_results: 5,
            prompt_news_limit: 3,
            search_rate_limit: 30,
            search_locale: SearchLocale::default(),
            language: Language::English,
            yahoo_base_url: "https://query2.finance.yahoo.com".to_string(),
            serpapi_base_url: "https://serpapi.com".to_string(),
            gemini_api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() || self.ai_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        // One follow-up needs the question plus at least one prior turn
        if self.chat_window < 2 {
            return Err(StockError::ConfigError(
                "chat_window must be at least 2".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(StockError::ConfigError("model must not be empty".to_string()));
        }

        if self.search_rate_limit == 0 {
            return Err(StockError::ConfigError(
                "search_rate_limit must be greater than 0".to_string(),
            ));
        }

        if self.search_locale.language.trim().is_empty()
            || self.search_locale.country.trim().is_empty()
        {
            return Err(StockError::ConfigError(
                "search locale language and country must not be empty".to_string(),
            ));
        }

        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(StockError::ConfigError(format!(
                    "temperature {t} outside 0.0..=2.0"
                )));
            }
        }

        Ok(())
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    default_period: Option<Period>,
    request_timeout: Option<Duration>,
    ai_timeout: Option<Duration>,
    model: Option<String>,
    max_output_tokens: Option<usize>,
    temperature: Option<f32>,
    chat_window: Option<usize>,
    provider_news_count: Option<usize>,
    search_results: Option<usize>,
    prompt_news_limit: Option<usize>,
    search_rate_limit: Option<u32>,
    search_locale: Option<SearchLocale>,
    language: Option<Language>,
    yahoo_base_url: Option<String>,
    serpapi_base_url: Option<String>,
    gemini_api_base: Option<String>,
}

impl StockConfigBuilder {
    /// Set the default period
    pub fn default_period(mut self, period: Period) -> Self {
        self.default_period = Some(period);
        self
    }

    /// Set the market-data / search timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the generative-AI timeout
    pub fn ai_timeout(mut self, duration: Duration) -> Self {
        self.ai_timeout = Some(duration);
        self
    }

    /// Set the model identifier
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Read the model identifier from `GEMINI_MODEL` if set
    pub fn with_env_model(mut self) -> Self {
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.model = Some(model);
        }
        self
    }

    /// Set the maximum output tokens
    pub fn max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the chat resend window
    pub fn chat_window(mut self, messages: usize) -> Self {
        self.chat_window = Some(messages);
        self
    }

    /// Set the number of provider headlines to request
    pub fn provider_news_count(mut self, count: usize) -> Self {
        self.provider_news_count = Some(count);
        self
    }

    /// Set the number of search results to request
    pub fn search_results(mut self, count: usize) -> Self {
        self.search_results = Some(count);
        self
    }

    /// Set headlines per source included in the prompt
    pub fn prompt_news_limit(mut self, count: usize) -> Self {
        self.prompt_news_limit = Some(count);
        self
    }

    /// Set search API requests per minute
    pub fn search_rate_limit(mut self, per_minute: u32) -> Self {
        self.search_rate_limit = Some(per_minute);
        self
    }

    /// Set the search language (`hl`) and country (`gl`)
    pub fn search_locale(mut self, language: impl Into<String>, country: impl Into<String>) -> Self {
        self.search_locale = Some(SearchLocale::new(language, country));
        self
    }

    /// Set the prompt language
    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Override the Yahoo Finance host
    pub fn yahoo_base_url(mut self, url: impl Into<String>) -> Self {
        self.yahoo_base_url = Some(url.into());
        self
    }

    /// Override the SerpAPI host
    pub fn serpapi_base_url(mut self, url: impl Into<String>) -> Self {
        self.serpapi_base_url = Some(url.into());
        self
    }

    /// Override the Gemini base URL
    pub fn gemini_api_base(mut self, url: impl Into<String>) -> Self {
        self.gemini_api_base = Some(url.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            default_period: self.default_period.unwrap_or(defaults.default_period),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            ai_timeout: self.ai_timeout.unwrap_or(defaults.ai_timeout),
            model: self.model.unwrap_or(defaults.model),
            max_output_tokens: self.max_output_tokens.unwrap_or(defaults.max_output_tokens),
            temperature: self.temperature.or(defaults.temperature),
            chat_window: self.chat_window.unwrap_or(defaults.chat_window),
            provider_news_count: self
                .provider_news_count
                .unwrap_or(defaults.provider_news_count),
            search_results: self.search_results.unwrap_or(defaults.search_results),
            prompt_news_limit: self.prompt_news_limit.unwrap_or(defaults.prompt_news_limit),
            search_rate_limit: self.search_rate_limit.unwrap_or(defaults.search_rate_limit),
            search_locale: self.search_locale.unwrap_or(defaults.search_locale),
            language: self.language.unwrap_or(defaults.language),
            yahoo_base_url: self.yahoo_base_url.unwrap_or(defaults.yahoo_base_url),
            serpapi_base_url: self.serpapi_base_url.unwrap_or(defaults.serpapi_base_url),
            gemini_api_base: self.gemini_api_base.unwrap_or(defaults.gemini_api_base),
        };

        config.validate()?;
        Ok(config)
    }
}

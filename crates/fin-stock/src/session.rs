//! Session state and the actions that drive it

use crate::chat::ChatHistory;
use crate::error::{ErrorKind, StockError};
use crate::indicators::{IndicatorConfig, IndicatorSet};
use crate::market::{MarketSnapshot, Period};
use crate::news::NewsDigest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A user-supplied API key, held only in memory
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// `None` for a blank key
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        (!key.is_empty()).then_some(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    pub ai: Option<ApiKey>,
    pub search: Option<ApiKey>,
}

impl ApiKeys {
    pub fn new(ai: Option<&str>, search: Option<&str>) -> Self {
        Self {
            ai: ai.and_then(ApiKey::new),
            search: search.and_then(ApiKey::new),
        }
    }

    pub fn ai_key(&self) -> Option<&str> {
        self.ai.as_ref().map(ApiKey::expose)
    }

    pub fn search_key(&self) -> Option<&str> {
        self.search.as_ref().map(ApiKey::expose)
    }
}

/// One submitted analysis
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub period: Period,
    pub indicators: IndicatorConfig,
    pub keys: ApiKeys,
}

impl AnalysisRequest {
    /// Ticker is trimmed and upper-cased; emptiness is checked by the pipeline
    pub fn new(ticker: &str, period: Period) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            period,
            indicators: IndicatorConfig::default(),
            keys: ApiKeys::default(),
        }
    }

    #[must_use]
    pub fn with_indicators(mut self, indicators: IndicatorConfig) -> Self {
        self.indicators = indicators;
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: ApiKeys) -> Self {
        self.keys = keys;
        self
    }
}

/// User actions, each handled as one transition
#[derive(Debug, Clone)]
pub enum Action {
    Analyze(AnalysisRequest),
    ChangePeriod(Period),
    ConfigureIndicators(IndicatorConfig),
    SetApiKeys(ApiKeys),
    Ask(String),
    Reset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiState {
    #[default]
    NoAnalysis,
    AnalysisReady,
}

/// Dashboard area a notice belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Input,
    Market,
    Indicators,
    News,
    Ai,
    Chat,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Input => "input",
            Section::Market => "market data",
            Section::Indicators => "indicators",
            Section::News => "news",
            Section::Ai => "AI analysis",
            Section::Chat => "chat",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub section: Section,
    pub level: NoticeLevel,
    pub kind: Option<ErrorKind>,
    pub message: String,
}

impl Notice {
    pub fn info(section: Section, message: impl Into<String>) -> Self {
        Self {
            section,
            level: NoticeLevel::Info,
            kind: None,
            message: message.into(),
        }
    }

    pub fn warning(section: Section, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            ..Self::info(section, message)
        }
    }

    /// Informational notice carrying an error kind, e.g. a missing key
    pub fn unavailable(section: Section, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            ..Self::info(section, message)
        }
    }

    /// Invalid input and missing data are errors; degraded extras are warnings
    pub fn from_error(section: Section, error: &StockError) -> Self {
        let kind = error.kind();
        let level = match kind {
            ErrorKind::InvalidInput | ErrorKind::DataUnavailable => NoticeLevel::Error,
            ErrorKind::NewsUnavailable | ErrorKind::AiUnavailable => NoticeLevel::Warning,
        };
        Self {
            section,
            level,
            kind: Some(kind),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "[{}] {kind}: {}", self.section, self.message),
            None => write!(f, "[{}] {}", self.section, self.message),
        }
    }
}

/// Everything one user session knows
///
/// At most one snapshot is current; the indicator set is always derived from
/// that snapshot and the current indicator config.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) id: Uuid,
    pub(crate) ticker: Option<String>,
    pub(crate) period: Period,
    pub(crate) indicator_config: IndicatorConfig,
    pub(crate) keys: ApiKeys,
    pub(crate) snapshot: Option<Arc<MarketSnapshot>>,
    pub(crate) indicators: Option<IndicatorSet>,
    pub(crate) news: Option<NewsDigest>,
    pub(crate) ai: AiState,
    pub(crate) chat: ChatHistory,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Period::default())
    }
}

impl SessionState {
    pub fn new(period: Period) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker: None,
            period,
            indicator_config: IndicatorConfig::default(),
            keys: ApiKeys::default(),
            snapshot: None,
            indicators: None,
            news: None,
            ai: AiState::NoAnalysis,
            chat: ChatHistory::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ticker(&self) -> Option<&str> {
        self.ticker.as_deref()
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn indicator_config(&self) -> &IndicatorConfig {
        &self.indicator_config
    }

    pub fn keys(&self) -> &ApiKeys {
        &self.keys
    }

    pub fn snapshot(&self) -> Option<&Arc<MarketSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn indicators(&self) -> Option<&IndicatorSet> {
        self.indicators.as_ref()
    }

    pub fn news(&self) -> Option<&NewsDigest> {
        self.news.as_ref()
    }

    pub fn ai(&self) -> AiState {
        self.ai
    }

    pub fn chat(&self) -> &ChatHistory {
        &self.chat
    }

    /// A snapshot is loaded for the current ticker
    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Drop everything derived from the current ticker
    pub(crate) fn clear_analysis(&mut self) {
        self.snapshot = None;
        self.indicators = None;
        self.news = None;
        self.ai = AiState::NoAnalysis;
        self.chat.clear();
    }
}

/// Result of one action
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: SessionState,
    pub notices: Vec<Notice>,
}

impl Transition {
    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(|n| n.level == NoticeLevel::Error)
    }

    /// Notices carrying a given error kind
    pub fn notices_of(&self, kind: ErrorKind) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.kind == Some(kind))
    }
}

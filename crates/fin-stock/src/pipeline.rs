//! Session-state-driven analysis pipeline
//!
//! [`AnalysisPipeline::step`] is the only way a [`SessionState`] changes. Each
//! call consumes the current state and one [`Action`], runs the pipeline steps
//! it needs one at a time, and returns the new state with the notices the user
//! should see. Errors never escape a step; they become notices in the section
//! they belong to.

use crate::api::{MarketDataProvider, NewsSearch, SerpApiClient, YahooFinanceClient};
use crate::cache::SnapshotCache;
use crate::config::StockConfig;
use crate::error::{ErrorKind, Result, StockError};
use crate::fetcher::MarketDataFetcher;
use crate::indicators::{self, IndicatorConfig};
use crate::market::Period;
use crate::narrator::{Narrator, ProviderFactory, gemini_factory};
use crate::news::{NewsAggregator, NewsDigest, SearchNote};
use crate::prompts::AnalysisContext;
use crate::session::{
    Action, AiState, AnalysisRequest, ApiKeys, Notice, Section, SessionState, Transition,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const AI_KEY_REQUIRED: &str = "A Gemini API key is required for AI analysis";
const ASK_BEFORE_ANALYSIS: &str = "Run an analysis with an AI key before asking questions";

pub struct AnalysisPipeline {
    fetcher: MarketDataFetcher,
    news: NewsAggregator,
    narrator: Narrator,
    config: StockConfig,
}

impl AnalysisPipeline {
    pub fn new(
        config: StockConfig,
        market: Arc<dyn MarketDataProvider>,
        search: Arc<dyn NewsSearch>,
        ai: ProviderFactory,
    ) -> Result<Self> {
        config.validate()?;
        let fetcher = MarketDataFetcher::new(
            market,
            SnapshotCache::new(),
            config.request_timeout,
            config.provider_news_count,
        );
        let news = NewsAggregator::new(search, config.request_timeout, config.search_results);
        let narrator = Narrator::new(&config, ai)?;

        Ok(Self {
            fetcher,
            news,
            narrator,
            config,
        })
    }

    /// Yahoo Finance, SerpAPI and Gemini from the configured endpoints
    pub fn from_config(config: StockConfig) -> Result<Self> {
        let market = Arc::new(YahooFinanceClient::with_base_url(&config.yahoo_base_url)?);
        let search = Arc::new(
            SerpApiClient::new(&config.serpapi_base_url, config.search_rate_limit)
                .with_locale(config.search_locale.clone()),
        );
        let ai = gemini_factory(&config.gemini_api_base, config.ai_timeout);
        Self::new(config, market, search, ai)
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    /// Empty session on the configured default period
    pub fn initial_state(&self) -> SessionState {
        SessionState::new(self.config.default_period)
    }

    /// Apply one action
    #[instrument(skip_all, fields(session = %state.id()))]
    pub async fn step(&self, state: SessionState, action: Action) -> Transition {
        let mut run = Run {
            state,
            notices: Vec::new(),
        };

        match action {
            Action::Analyze(request) => self.analyze(&mut run, request).await,
            Action::ChangePeriod(period) => {
                self.change_period(&mut run, period).await;
            }
            Action::ConfigureIndicators(config) => Self::configure_indicators(&mut run, config),
            Action::SetApiKeys(keys) => Self::set_keys(&mut run, keys),
            Action::Ask(question) => self.ask(&mut run, &question).await,
            Action::Reset => self.reset(&mut run).await,
        }

        Transition {
            state: run.state,
            notices: run.notices,
        }
    }

    async fn analyze(&self, run: &mut Run, request: AnalysisRequest) {
        if request.ticker.is_empty() {
            run.error(
                Section::Input,
                &StockError::InvalidInput("Please enter a ticker symbol".to_string()),
            );
            return;
        }
        if let Err(e) = request.indicators.validate() {
            run.error(Section::Indicators, &e);
            return;
        }

        let state = &mut run.state;
        state.keys = request.keys;
        state.indicator_config = request.indicators;

        let new_ticker = state.ticker.as_deref() != Some(request.ticker.as_str());
        if new_ticker || !state.is_loaded() {
            info!(ticker = %request.ticker, period = %request.period, "Analyzing new ticker");
            state.clear_analysis();
            self.fetcher.cache().clear().await;
            state.ticker = Some(request.ticker);
            state.period = request.period;

            if self.load_snapshot(run).await {
                run.refresh_indicators();
                self.refresh_news(run).await;
                self.initial_analysis(run).await;
            }
            return;
        }

        let moved = state.period != request.period
            && self.change_period(run, request.period).await;
        if !moved {
            // the stored config may be new even when the snapshot is not
            debug!("Reusing loaded snapshot");
            run.refresh_indicators();
        }

        let missing_search = run
            .state
            .news
            .as_ref()
            .is_none_or(|d| d.search_note == Some(SearchNote::MissingKey));
        if missing_search && run.state.keys.search.is_some() {
            self.refresh_news(run).await;
        }
        self.initial_analysis(run).await;
    }

    /// Swap in the snapshot for another period; chat history is kept
    ///
    /// On failure the previous period and snapshot stay current. Returns
    /// whether a new snapshot was installed and its indicators recomputed.
    async fn change_period(&self, run: &mut Run, period: Period) -> bool {
        let Some(ticker) = run.state.ticker.clone().filter(|_| run.state.is_loaded()) else {
            run.state.period = period;
            run.notices.push(Notice::info(
                Section::Input,
                format!("Period set to {period}"),
            ));
            return false;
        };
        if run.state.period == period {
            return false;
        }

        match self.fetcher.fetch(&ticker, period).await {
            Ok(snapshot) => {
                info!(%ticker, %period, "Period changed");
                run.warnings_of(&snapshot.warnings);
                run.state.period = period;
                run.state.snapshot = Some(snapshot);
                run.refresh_indicators();
                true
            }
            Err(e) => {
                run.error(Section::Market, &e);
                false
            }
        }
    }

    fn configure_indicators(run: &mut Run, config: IndicatorConfig) {
        if let Err(e) = config.validate() {
            run.error(Section::Indicators, &e);
            return;
        }
        run.state.indicator_config = config;
        run.refresh_indicators();
    }

    fn set_keys(run: &mut Run, keys: ApiKeys) {
        let ai = if keys.ai.is_some() { "set" } else { "not set" };
        let search = if keys.search.is_some() { "set" } else { "not set" };
        run.state.keys = keys;
        run.notices.push(Notice::info(
            Section::Input,
            format!("AI key {ai}, search key {search}"),
        ));
    }

    async fn ask(&self, run: &mut Run, question: &str) {
        let question = question.trim();
        if question.is_empty() {
            run.error(
                Section::Chat,
                &StockError::InvalidInput("question must not be empty".to_string()),
            );
            return;
        }
        if run.state.ai != AiState::AnalysisReady {
            run.notices.push(Notice::unavailable(
                Section::Chat,
                ErrorKind::AiUnavailable,
                ASK_BEFORE_ANALYSIS,
            ));
            return;
        }
        let Some(key) = run.state.keys.ai_key().map(str::to_string) else {
            run.notices.push(Notice::unavailable(
                Section::Chat,
                ErrorKind::AiUnavailable,
                AI_KEY_REQUIRED,
            ));
            return;
        };

        run.state.chat.push_user(question);
        match self.narrator.follow_up(&key, &run.state.chat).await {
            Ok(answer) => run.state.chat.push_assistant(answer),
            Err(e) => {
                run.state.chat.pop_pending_user();
                run.error(Section::Chat, &e);
            }
        }
    }

    async fn reset(&self, run: &mut Run) {
        info!("Resetting session");
        self.fetcher.cache().clear().await;
        let keys = std::mem::take(&mut run.state.keys);
        run.state = self.initial_state();
        run.state.keys = keys;
    }

    /// Fetch the snapshot for the state's ticker and period
    async fn load_snapshot(&self, run: &mut Run) -> bool {
        let Some(ticker) = run.state.ticker.clone() else {
            return false;
        };
        match self.fetcher.fetch(&ticker, run.state.period).await {
            Ok(snapshot) => {
                run.warnings_of(&snapshot.warnings);
                run.state.snapshot = Some(snapshot);
                true
            }
            Err(e) => {
                run.error(Section::Market, &e);
                false
            }
        }
    }

    async fn refresh_news(&self, run: &mut Run) {
        let Some(snapshot) = run.state.snapshot.clone() else {
            return;
        };
        let digest = self
            .news
            .aggregate(&snapshot, run.state.keys.search_key())
            .await;

        match &digest.search_note {
            Some(note @ SearchNote::MissingKey) => run.notices.push(Notice::unavailable(
                Section::News,
                ErrorKind::NewsUnavailable,
                note.to_string(),
            )),
            Some(SearchNote::Failed(reason)) => run.error(
                Section::News,
                &StockError::NewsUnavailable(reason.clone()),
            ),
            None => {}
        }
        run.state.news = Some(digest);
    }

    /// `NoAnalysis -> AnalysisReady` when a snapshot and an AI key are present
    async fn initial_analysis(&self, run: &mut Run) {
        if run.state.ai == AiState::AnalysisReady {
            return;
        }
        let Some(snapshot) = run.state.snapshot.clone() else {
            return;
        };
        let Some(key) = run.state.keys.ai_key().map(str::to_string) else {
            run.notices.push(Notice::unavailable(
                Section::Ai,
                ErrorKind::AiUnavailable,
                AI_KEY_REQUIRED,
            ));
            return;
        };

        let empty_digest = NewsDigest::default();
        let empty_indicators = indicators::IndicatorSet::default();
        let ctx = AnalysisContext::build(
            &snapshot,
            run.state.news.as_ref().unwrap_or(&empty_digest),
            run.state.indicators.as_ref().unwrap_or(&empty_indicators),
            &run.state.indicator_config,
            self.config.prompt_news_limit,
        );

        match self.narrator.initial_analysis(&key, &ctx).await {
            Ok(result) => {
                info!(ticker = %snapshot.ticker, "Initial analysis ready");
                run.state.chat.start(result.prompt, result.analysis);
                run.state.ai = AiState::AnalysisReady;
            }
            Err(e) => run.error(Section::Ai, &e),
        }
    }
}

/// State and notices accumulated during one step
struct Run {
    state: SessionState,
    notices: Vec<Notice>,
}

impl Run {
    fn error(&mut self, section: Section, error: &StockError) {
        self.notices.push(Notice::from_error(section, error));
    }

    fn warnings_of(&mut self, warnings: &[String]) {
        self.notices
            .extend(warnings.iter().map(|w| Notice::warning(Section::Market, w.clone())));
    }

    fn refresh_indicators(&mut self) {
        let Some(snapshot) = self.state.snapshot.as_ref() else {
            self.state.indicators = None;
            return;
        };
        match indicators::compute(&snapshot.candles, &self.state.indicator_config) {
            Ok(set) => self.state.indicators = Some(set),
            Err(e) => {
                self.state.indicators = None;
                self.error(Section::Indicators, &e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockMarketDataProvider, MockNewsSearch};
    use crate::market::{
        CompanyInfo, Financials, Holders, NewsItem, NewsSource, PriceHistory,
    };
    use crate::session::NoticeLevel;
    use chrono::{Duration as ChronoDuration, Utc};
    use fin_llm::{
        CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, StopReason,
        TokenUsage,
    };
    use std::sync::Mutex;

    struct EchoProvider {
        calls: Mutex<usize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LLMProvider for EchoProvider {
        async fn complete(&self, request: CompletionRequest) -> fin_llm::Result<CompletionResponse> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(LLMError::RateLimitExceeded("quota".to_string()));
            }
            let last = request
                .messages
                .last()
                .and_then(Message::text)
                .unwrap_or_default()
                .chars()
                .take(20)
                .collect::<String>();
            Ok(CompletionResponse {
                message: Message::assistant(format!("reply to {last}")),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn ai(fail: bool) -> (Arc<EchoProvider>, ProviderFactory) {
        let provider = Arc::new(EchoProvider {
            calls: Mutex::new(0),
            fail,
        });
        let shared = Arc::clone(&provider);
        let factory: ProviderFactory = Arc::new(move |_key: &str| {
            let p: Arc<dyn LLMProvider> = shared.clone();
            Ok(p)
        });
        (provider, factory)
    }

    fn history() -> PriceHistory {
        let now = Utc::now();
        let candles = (0..60u32)
            .map(|i| crate::market::Candle {
                timestamp: (now - ChronoDuration::days(i64::from(60 - i))).fixed_offset(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + f64::from(i),
                volume: Some(1_000),
            })
            .collect();
        PriceHistory {
            candles,
            timezone: Some("America/New_York".to_string()),
        }
    }

    fn market(history_calls: usize) -> MockMarketDataProvider {
        let mut mock = MockMarketDataProvider::new();
        mock.expect_price_history()
            .times(history_calls)
            .returning(|_, _| Ok(history()));
        sections(&mut mock);
        mock
    }

    /// Price history fails for `bad` and succeeds for every other period
    fn market_failing_on(bad: Period) -> MockMarketDataProvider {
        let mut mock = MockMarketDataProvider::new();
        mock.expect_price_history().returning(move |_, period| {
            if period == bad {
                Err(StockError::ApiError("chart endpoint down".to_string()))
            } else {
                Ok(history())
            }
        });
        sections(&mut mock);
        mock
    }

    fn sections(mock: &mut MockMarketDataProvider) {
        mock.expect_company_info()
            .returning(|_| Ok(CompanyInfo::default()));
        mock.expect_financials()
            .returning(|_| Ok(Financials::default()));
        mock.expect_holders().returning(|_| Ok(Holders::default()));
        mock.expect_recommendations().returning(|_| Ok(Vec::new()));
        mock.expect_dividends().returning(|_| Ok(Vec::new()));
        mock.expect_news().returning(|_, _| {
            Ok(vec![NewsItem {
                title: "Earnings beat".to_string(),
                link: "https://example.com/a".to_string(),
                publisher: "Reuters".to_string(),
                published: None,
                source: NewsSource::Provider,
            }])
        });
        mock.expect_name().return_const("mock".to_string());
    }

    fn pipeline(
        market: MockMarketDataProvider,
        search: MockNewsSearch,
        factory: ProviderFactory,
    ) -> AnalysisPipeline {
        AnalysisPipeline::new(
            StockConfig::default(),
            Arc::new(market),
            Arc::new(search),
            factory,
        )
        .unwrap()
    }

    fn no_search() -> MockNewsSearch {
        let mut search = MockNewsSearch::new();
        search.expect_search().never();
        search.expect_name().return_const("mock".to_string());
        search
    }

    fn request(ticker: &str, keys: ApiKeys) -> Action {
        Action::Analyze(AnalysisRequest::new(ticker, Period::OneYear).with_keys(keys))
    }

    #[tokio::test]
    async fn test_empty_ticker_is_invalid_input() {
        let (_, factory) = ai(false);
        let pipeline = pipeline(market(0), no_search(), factory);

        let t = pipeline
            .step(pipeline.initial_state(), request("   ", ApiKeys::default()))
            .await;

        assert_eq!(t.notices_of(ErrorKind::InvalidInput).count(), 1);
        assert!(t.state.ticker().is_none());
    }

    #[tokio::test]
    async fn test_analyze_without_keys() {
        let (provider, factory) = ai(false);
        let pipeline = pipeline(market(1), no_search(), factory);

        let t = pipeline
            .step(pipeline.initial_state(), request("aapl", ApiKeys::default()))
            .await;

        assert_eq!(t.state.ticker(), Some("AAPL"));
        assert!(t.state.is_loaded());
        assert!(t.state.indicators().unwrap().rsi.is_some());
        assert_eq!(t.state.ai(), AiState::NoAnalysis);
        assert_eq!(t.state.news().unwrap().provider.len(), 1);
        assert!(t.notices_of(ErrorKind::AiUnavailable).any(|n| n.level == NoticeLevel::Info));
        assert!(!t.has_errors());
        assert_eq!(*provider.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_same_request_reuses_snapshot_and_adds_analysis() {
        let (provider, factory) = ai(false);
        let pipeline = pipeline(market(1), no_search(), factory);

        let first = pipeline
            .step(pipeline.initial_state(), request("AAPL", ApiKeys::default()))
            .await;
        let snapshot = Arc::clone(first.state.snapshot().unwrap());

        let second = pipeline
            .step(first.state, request("AAPL", ApiKeys::new(Some("key"), None)))
            .await;

        assert!(Arc::ptr_eq(&snapshot, second.state.snapshot().unwrap()));
        assert_eq!(second.state.ai(), AiState::AnalysisReady);
        assert!(second.state.chat().is_started());
        assert_eq!(*provider.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_follow_up_pops_question() {
        let (_, factory) = ai(false);
        let pipeline = pipeline(market(1), no_search(), factory);
        let t = pipeline
            .step(pipeline.initial_state(), request("AAPL", ApiKeys::new(Some("k"), None)))
            .await;
        assert_eq!(t.state.ai(), AiState::AnalysisReady);

        let t = pipeline.step(t.state, Action::Ask("How is margin?".into())).await;
        assert_eq!(t.state.chat().len(), 3);

        let (_, failing) = ai(true);
        let failing_pipeline = pipeline_with_ai(failing);
        let t = failing_pipeline
            .step(t.state, Action::Ask("And debt?".into()))
            .await;
        assert_eq!(t.state.chat().len(), 3);
        assert_eq!(t.notices_of(ErrorKind::AiUnavailable).count(), 1);
    }

    fn pipeline_with_ai(factory: ProviderFactory) -> AnalysisPipeline {
        pipeline(market(0), no_search(), factory)
    }

    #[tokio::test]
    async fn test_ask_before_analysis() {
        let (_, factory) = ai(false);
        let pipeline = pipeline(market(0), no_search(), factory);

        let t = pipeline
            .step(pipeline.initial_state(), Action::Ask("hello".into()))
            .await;

        assert!(t.state.chat().is_empty());
        assert_eq!(t.notices_of(ErrorKind::AiUnavailable).count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_indicator_config_keeps_previous() {
        let (_, factory) = ai(false);
        let pipeline = pipeline(market(0), no_search(), factory);
        let mut config = IndicatorConfig::default();
        config.macd.fast = 30;
        config.macd.slow = 20;

        let t = pipeline
            .step(pipeline.initial_state(), Action::ConfigureIndicators(config))
            .await;

        assert_eq!(t.state.indicator_config(), &IndicatorConfig::default());
        assert_eq!(t.notices_of(ErrorKind::InvalidInput).count(), 1);
    }

    #[tokio::test]
    async fn test_reset_keeps_keys() {
        let (_, factory) = ai(false);
        let pipeline = pipeline(market(1), no_search(), factory);
        let t = pipeline
            .step(pipeline.initial_state(), request("AAPL", ApiKeys::new(Some("k"), None)))
            .await;
        let id = t.state.id();

        let t = pipeline.step(t.state, Action::Reset).await;

        assert!(t.state.ticker().is_none());
        assert!(!t.state.is_loaded());
        assert!(t.state.chat().is_empty());
        assert_eq!(t.state.keys().ai_key(), Some("k"));
        assert_ne!(t.state.id(), id);
        assert!(pipeline.fetcher.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_period_change_in_analyze_recomputes_indicators() {
        let (_, factory) = ai(false);
        let pipeline = pipeline(market_failing_on(Period::FiveYears), no_search(), factory);
        let t = pipeline
            .step(pipeline.initial_state(), request("AAPL", ApiKeys::default()))
            .await;
        let snapshot = Arc::clone(t.state.snapshot().unwrap());

        let mut config = IndicatorConfig::default();
        config.sma.enabled = false;
        let retry = AnalysisRequest::new("AAPL", Period::FiveYears).with_indicators(config);
        let t = pipeline.step(t.state, Action::Analyze(retry)).await;

        assert_eq!(t.notices_of(ErrorKind::DataUnavailable).count(), 1);
        assert_eq!(t.state.period(), Period::OneYear);
        assert!(Arc::ptr_eq(&snapshot, t.state.snapshot().unwrap()));
        assert_eq!(t.state.indicator_config(), &config);

        let set = t.state.indicators().unwrap();
        assert!(set.sma.is_none());
        assert_eq!(set, &indicators::compute(&snapshot.candles, &config).unwrap());
    }
}

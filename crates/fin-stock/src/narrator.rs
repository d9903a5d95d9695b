//! AI narrator: initial analysis and follow-up chat turns

use crate::chat::{ChatHistory, ChatRole};
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::prompts::{AnalysisContext, Language, PromptLibrary};
use fin_llm::providers::{GeminiConfig, GeminiProvider};
use fin_llm::{CompletionRequest, GenerationConfig, LLMProvider, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builds a provider for the session's AI key
pub type ProviderFactory =
    Arc<dyn Fn(&str) -> fin_llm::Result<Arc<dyn LLMProvider>> + Send + Sync>;

/// Factory producing Gemini providers against `api_base`
pub fn gemini_factory(api_base: impl Into<String>, timeout: Duration) -> ProviderFactory {
    let api_base = api_base.into();
    Arc::new(move |key: &str| {
        let config = GeminiConfig::new(key)
            .with_api_base(api_base.clone())
            .with_timeout(timeout.as_secs().max(1));
        let provider: Arc<dyn LLMProvider> = Arc::new(GeminiProvider::with_config(config)?);
        Ok(provider)
    })
}

/// Result of the first AI call for a ticker
#[derive(Debug, Clone, PartialEq)]
pub struct InitialAnalysis {
    pub prompt: String,
    pub analysis: String,
}

pub struct Narrator {
    factory: ProviderFactory,
    prompts: PromptLibrary,
    model: String,
    generation: GenerationConfig,
    language: Language,
    timeout: Duration,
    chat_window: usize,
}

impl Narrator {
    pub fn new(config: &StockConfig, factory: ProviderFactory) -> Result<Self> {
        Ok(Self {
            factory,
            prompts: PromptLibrary::new()?,
            model: config.model.clone(),
            generation: GenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
            },
            language: config.language,
            timeout: config.ai_timeout,
            chat_window: config.chat_window,
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Render the analysis prompt and ask for the initial analysis
    pub async fn initial_analysis(
        &self,
        api_key: &str,
        ctx: &AnalysisContext,
    ) -> Result<InitialAnalysis> {
        let prompt = self.prompts.analysis_prompt(self.language, ctx)?;
        info!(ticker = %ctx.ticker, model = %self.model, "Requesting initial analysis");

        let analysis = self
            .complete(api_key, vec![Message::user(prompt.clone())])
            .await?;

        Ok(InitialAnalysis { prompt, analysis })
    }

    /// Answer the trailing user message of `history`
    ///
    /// Sends the anchored prompt and analysis followed by the most recent
    /// `chat_window` turns.
    pub async fn follow_up(&self, api_key: &str, history: &ChatHistory) -> Result<String> {
        let Some((prompt, analysis)) = history.anchor() else {
            return Err(StockError::AiUnavailable(
                "no initial analysis to continue from".to_string(),
            ));
        };

        let window = history.window(self.chat_window);
        if window.last().map(|m| m.role) != Some(ChatRole::User) {
            return Err(StockError::InvalidInput(
                "follow-up requires a pending question".to_string(),
            ));
        }

        let mut messages = vec![Message::user(prompt), Message::assistant(analysis)];
        messages.extend(window.iter().map(|m| match m.role {
            ChatRole::User => Message::user(m.text.clone()),
            ChatRole::Assistant => Message::assistant(m.text.clone()),
        }));

        debug!(messages = messages.len(), "Sending follow-up");
        self.complete(api_key, messages).await
    }

    async fn complete(&self, api_key: &str, messages: Vec<Message>) -> Result<String> {
        let provider = (self.factory)(api_key)
            .map_err(|e| StockError::AiUnavailable(e.to_string()))?;

        let request = CompletionRequest::builder(self.model.clone())
            .messages(messages)
            .system(self.prompts.system_prompt(self.language)?)
            .generation(self.generation)
            .build();

        let response = tokio::time::timeout(self.timeout, provider.complete(request))
            .await
            .map_err(|_| {
                StockError::AiUnavailable(format!(
                    "{} timed out after {}s",
                    provider.name(),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| StockError::AiUnavailable(e.to_string()))?;

        if response.stop_reason.is_truncated() {
            warn!("Response truncated at max output tokens");
        }
        debug!(tokens = response.usage.total(), "Completion received");

        response
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| StockError::AiUnavailable("model returned no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::Ratios;
    use fin_llm::{CompletionResponse, LLMError, Role, StopReason, TokenUsage};
    use std::sync::Mutex;

    /// Records every request and replies from a script
    struct ScriptedProvider {
        replies: Mutex<Vec<fin_llm::Result<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait::async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, request: CompletionRequest) -> fin_llm::Result<CompletionResponse> {
            self.requests.lock().unwrap().push(request);
            let text = self.replies.lock().unwrap().remove(0)?;
            Ok(CompletionResponse {
                message: Message::assistant(text),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn scripted(replies: Vec<fin_llm::Result<String>>) -> (Arc<ScriptedProvider>, ProviderFactory) {
        let provider = Arc::new(ScriptedProvider {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        });
        let shared = Arc::clone(&provider);
        let factory: ProviderFactory = Arc::new(move |_key: &str| {
            let p: Arc<dyn LLMProvider> = shared.clone();
            Ok(p)
        });
        (provider, factory)
    }

    fn context() -> AnalysisContext {
        AnalysisContext {
            company: "Apple Inc.".to_string(),
            ticker: "AAPL".to_string(),
            period: "1Y".to_string(),
            latest_close: "189.95".to_string(),
            sector: "Technology".to_string(),
            industry: "N/A".to_string(),
            market_cap: "2.95T".to_string(),
            beta: "N/A".to_string(),
            summary: "N/A".to_string(),
            income: None,
            cash_flow: None,
            ratios: Ratios {
                trailing_pe: "N/A".to_string(),
                price_to_book: "N/A".to_string(),
                dividend_yield: "N/A".to_string(),
                return_on_equity: "N/A".to_string(),
            },
            indicators: Vec::new(),
            provider_news: Vec::new(),
            search_news: Vec::new(),
            search_note: None,
        }
    }

    fn config(window: usize) -> StockConfig {
        StockConfig::builder().chat_window(window).build().unwrap()
    }

    #[tokio::test]
    async fn test_initial_analysis() {
        let (provider, factory) = scripted(vec![Ok("  Strong balance sheet.  ".to_string())]);
        let narrator = Narrator::new(&config(20), factory).unwrap();

        let result = narrator.initial_analysis("key", &context()).await.unwrap();

        assert_eq!(result.analysis, "Strong balance sheet.");
        assert!(result.prompt.contains("Apple Inc. (AAPL)"));
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 1);
        assert!(requests[0].system.is_some());
    }

    #[tokio::test]
    async fn test_follow_up_resends_anchor_and_window() {
        let (provider, factory) = scripted(vec![Ok("answer".to_string())]);
        let narrator = Narrator::new(&config(2), factory).unwrap();

        let mut history = ChatHistory::new();
        history.start("initial prompt", "initial analysis");
        history.push_user("q1");
        history.push_assistant("a1");
        history.push_user("q2");

        let reply = narrator.follow_up("key", &history).await.unwrap();
        assert_eq!(reply, "answer");

        let requests = provider.requests.lock().unwrap();
        let sent = &requests[0].messages;
        // anchor (2) + window of 2 trimmed to start on a user turn (1)
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].text(), Some("initial prompt"));
        assert_eq!(sent[1].role, Role::Assistant);
        assert_eq!(sent[2].text(), Some("q2"));
    }

    #[tokio::test]
    async fn test_provider_error_is_ai_unavailable() {
        let (_, factory) = scripted(vec![Err(LLMError::AuthenticationFailed)]);
        let narrator = Narrator::new(&config(20), factory).unwrap();

        let err = narrator.initial_analysis("bad", &context()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AiUnavailable);
    }

    #[tokio::test]
    async fn test_empty_reply_is_ai_unavailable() {
        let (_, factory) = scripted(vec![Ok("   ".to_string())]);
        let narrator = Narrator::new(&config(20), factory).unwrap();

        let err = narrator.initial_analysis("key", &context()).await.unwrap_err();
        assert!(matches!(err, StockError::AiUnavailable(_)));
    }

    #[tokio::test]
    async fn test_factory_error_is_ai_unavailable() {
        let factory: ProviderFactory = Arc::new(|_key: &str| {
            Err(LLMError::ConfigurationError("empty key".to_string()))
        });
        let narrator = Narrator::new(&config(20), factory).unwrap();

        let err = narrator.initial_analysis("", &context()).await.unwrap_err();
        assert!(err.to_string().contains("empty key"));
    }

    #[tokio::test]
    async fn test_follow_up_without_anchor() {
        let (_, factory) = scripted(Vec::new());
        let narrator = Narrator::new(&config(20), factory).unwrap();

        let err = narrator
            .follow_up("key", &ChatHistory::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::AiUnavailable(_)));
    }

    #[test]
    fn test_gemini_factory_rejects_empty_key() {
        let factory = gemini_factory("http://localhost:1", Duration::from_secs(1));
        assert!(factory("  ").is_err());
        assert!(factory("abc").is_ok());
    }
}

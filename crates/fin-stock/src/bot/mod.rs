//! Interactive terminal front end
//!
//! The bot parses each line into a [`Command`], turns it into a session
//! [`Action`], runs it through the [`AnalysisPipeline`], and renders the
//! notices plus the relevant dashboard tab.
//!
//! # Example
//!
//! ```rust,ignore
//! use fin_stock::bot::{BotConfig, StockBot};
//! use fin_stock::{AnalysisPipeline, StockConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = AnalysisPipeline::from_config(StockConfig::default())?;
//!     let mut bot = StockBot::new(pipeline, BotConfig::default());
//!     bot.run_repl().await?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod render;

use crate::dashboard::{Dashboard, Tab};
use crate::error::Result;
use crate::pipeline::AnalysisPipeline;
use crate::session::{Action, AiState, AnalysisRequest, ApiKey, ApiKeys, SessionState};
use std::io::{self, BufRead, Write};
use tracing::debug;

pub use commands::{Command, IndicatorCommand, KeyTarget};

/// Configuration for the terminal bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub welcome_message: String,
    pub prompt: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            welcome_message: "fin-agent: stock dashboard with AI analysis. Type help for commands."
                .to_string(),
            prompt: "fin> ".to_string(),
        }
    }
}

impl BotConfig {
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct BotConfigBuilder {
    welcome_message: Option<String>,
    prompt: Option<String>,
}

impl BotConfigBuilder {
    pub fn welcome_message(mut self, msg: impl Into<String>) -> Self {
        self.welcome_message = Some(msg.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> BotConfig {
        let defaults = BotConfig::default();
        BotConfig {
            welcome_message: self.welcome_message.unwrap_or(defaults.welcome_message),
            prompt: self.prompt.unwrap_or(defaults.prompt),
        }
    }
}

/// What the REPL should do after a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Exit,
}

pub struct StockBot {
    pipeline: AnalysisPipeline,
    state: SessionState,
    tab: Tab,
    config: BotConfig,
}

impl StockBot {
    pub fn new(pipeline: AnalysisPipeline, config: BotConfig) -> Self {
        let state = pipeline.initial_state();
        Self {
            pipeline,
            state,
            tab: Tab::Overview,
            config,
        }
    }

    pub fn welcome(&self) -> &str {
        &self.config.welcome_message
    }

    pub fn prompt(&self) -> &str {
        &self.config.prompt
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_tab(&self) -> Tab {
        self.tab
    }

    /// Store keys in the session without fetching anything
    pub async fn set_keys(&mut self, keys: ApiKeys) -> String {
        self.apply(Action::SetApiKeys(keys)).await
    }

    /// Parse and execute one line
    pub async fn process_input(&mut self, input: &str) -> Result<Reply> {
        let command = Command::parse(input)?;
        debug!(?command, "Parsed command");
        Ok(self.execute(command).await)
    }

    pub async fn execute(&mut self, command: Command) -> Reply {
        let text = match command {
            Command::Analyze { ticker, period } => {
                let request = AnalysisRequest::new(&ticker, period.unwrap_or(self.state.period()))
                    .with_indicators(*self.state.indicator_config())
                    .with_keys(self.state.keys().clone());
                self.tab = Tab::Overview;
                self.apply(Action::Analyze(request)).await
            }
            Command::Period(period) => self.apply(Action::ChangePeriod(period)).await,
            Command::SetKey { target, key } => {
                let mut keys = self.state.keys().clone();
                match target {
                    KeyTarget::Ai => keys.ai = ApiKey::new(key),
                    KeyTarget::Search => keys.search = ApiKey::new(key),
                }
                self.apply(Action::SetApiKeys(keys)).await
            }
            Command::ClearKeys => self.apply(Action::SetApiKeys(ApiKeys::default())).await,
            Command::Indicator(change) => {
                let config = change.apply(*self.state.indicator_config());
                self.tab = Tab::PriceAnalysis;
                self.apply(Action::ConfigureIndicators(config)).await
            }
            Command::Indicators => render::indicator_config(self.state.indicator_config()),
            Command::Show(tab) => {
                self.tab = tab;
                self.render_current()
            }
            Command::Ask(question) => self.ask(question).await,
            Command::Query(text) if self.state.ai() == AiState::AnalysisReady => {
                self.ask(text).await
            }
            Command::Query(_) => {
                "Not a command. Type help for the command list, or run an analysis with an AI key to chat."
                    .to_string()
            }
            Command::Reset => {
                self.tab = Tab::Overview;
                self.apply(Action::Reset).await
            }
            Command::Help => Command::help_text().trim().to_string(),
            Command::Exit => return Reply::Exit,
        };
        Reply::Text(text)
    }

    async fn ask(&mut self, question: String) -> String {
        self.tab = Tab::AiChat;
        self.apply(Action::Ask(question)).await
    }

    /// Run an action and render its notices and the current tab
    async fn apply(&mut self, action: Action) -> String {
        let state = std::mem::take(&mut self.state);
        let transition = self.pipeline.step(state, action).await;
        self.state = transition.state;

        let mut out = render::notices(&transition.notices);
        if self.state.is_loaded() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.render_current());
        }
        out.trim_end().to_string()
    }

    fn render_current(&self) -> String {
        match Dashboard::build(&self.state) {
            Some(dashboard) => render::tab(&dashboard, self.tab),
            None => "Nothing to show yet. Try: analyze AAPL".to_string(),
        }
    }

    /// Read commands from stdin until `exit` or end of input
    pub async fn run_repl(&mut self) -> io::Result<()> {
        println!("{}\n", self.welcome());
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("{}", self.prompt());
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {e}");
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match self.process_input(input).await {
                Ok(Reply::Text(text)) => println!("{text}\n"),
                Ok(Reply::Exit) => {
                    println!("Goodbye!");
                    break;
                }
                Err(e) => eprintln!("Error: {e}\n"),
            }
        }
        Ok(())
    }
}

//! Stock dashboard with AI analysis
//!
//! This crate drives a session-state-driven analysis pipeline: given a ticker
//! and optional API keys it fetches market data, derives technical indicators,
//! merges news, asks a generative model for an analysis and builds a
//! renderable dashboard. It includes:
//!
//! - Market data from Yahoo Finance, memoized per (ticker, period)
//! - SMA, EMA, RSI, MACD and Bollinger Bands via the `ta` crate
//! - Provider headlines merged with SerpAPI Google News results
//! - Gemini analysis with follow-up chat over an anchored context
//! - A five-tab dashboard view model and a terminal front end
//!
//! # Architecture
//!
//! [`SessionState`] holds everything a session knows. Each user [`Action`]
//! goes through [`AnalysisPipeline::step`], which returns the next state and
//! a list of notices. Failures never escape a step; they are reported as
//! notices in the section they affect.
//!
//! # Example
//!
//! ```rust,ignore
//! use fin_stock::{Action, AnalysisPipeline, AnalysisRequest, Dashboard, Period, StockConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = AnalysisPipeline::from_config(StockConfig::default())?;
//!     let request = AnalysisRequest::new("AAPL", Period::OneYear);
//!
//!     let transition = pipeline
//!         .step(pipeline.initial_state(), Action::Analyze(request))
//!         .await;
//!     for notice in &transition.notices {
//!         println!("{notice}");
//!     }
//!     if let Some(dashboard) = Dashboard::build(&transition.state) {
//!         println!("{}", dashboard.header());
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bot;
pub mod cache;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod indicators;
pub mod market;
pub mod narrator;
pub mod news;
pub mod pipeline;
pub mod prompts;
pub mod session;

// Re-export main types for convenience
pub use cache::SnapshotCache;
pub use chat::{ChatHistory, ChatMessage, ChatRole};
pub use config::StockConfig;
pub use dashboard::{Dashboard, Tab};
pub use error::{ErrorKind, Result, StockError};
pub use indicators::{IndicatorConfig, IndicatorSet};
pub use market::{MarketSnapshot, Period};
pub use narrator::{Narrator, ProviderFactory};
pub use news::NewsDigest;
pub use pipeline::AnalysisPipeline;
pub use prompts::Language;
pub use session::{
    Action, AiState, AnalysisRequest, ApiKey, ApiKeys, Notice, NoticeLevel, Section, SessionState,
    Transition,
};

//! Analysis prompt templates
//!
//! Templates are bilingual MiniJinja sources registered once in a
//! [`PromptLibrary`]. The data they render comes from [`AnalysisContext`],
//! which is assembled from a snapshot, its news digest and the indicators.

mod context;
mod templates;

pub use context::{AnalysisContext, CashFlowSummary, Headline, IncomeSummary, Ratios};

use crate::error::{Result, StockError};
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language of the prompt and the model's answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    /// Traditional Chinese
    Chinese,
}

impl Language {
    /// ISO 639-1 code
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::English => "English",
            Language::Chinese => "Chinese",
        })
    }
}

impl FromStr for Language {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "zh" | "zh-tw" | "zh-hant" | "chinese" | "中文" => Ok(Language::Chinese),
            other => Err(StockError::InvalidInput(format!(
                "unsupported language '{other}' (expected en or zh)"
            ))),
        }
    }
}

/// Compiled prompt templates
pub struct PromptLibrary {
    env: Environment<'static>,
}

impl PromptLibrary {
    /// Register every template; fails only if a template does not parse
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        env.add_template("system.en", templates::SYSTEM_EN)?;
        env.add_template("system.zh", templates::SYSTEM_ZH)?;
        env.add_template("analysis.en", templates::ANALYSIS_EN)?;
        env.add_template("analysis.zh", templates::ANALYSIS_ZH)?;

        Ok(Self { env })
    }

    fn render(&self, name: &str, language: Language, ctx: impl Serialize) -> Result<String> {
        let template = self
            .env
            .get_template(&format!("{name}.{}", language.code()))?;
        Ok(template.render(ctx)?.trim().to_string())
    }

    /// System instruction sent with every request
    pub fn system_prompt(&self, language: Language) -> Result<String> {
        self.render("system", language, ())
    }

    /// Initial analysis request
    pub fn analysis_prompt(&self, language: Language, ctx: &AnalysisContext) -> Result<String> {
        self.render("analysis", language, ctx)
    }
}

impl fmt::Debug for PromptLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptLibrary").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AnalysisContext {
        AnalysisContext {
            company: "Apple Inc.".to_string(),
            ticker: "AAPL".to_string(),
            period: "1Y".to_string(),
            latest_close: "189.95".to_string(),
            sector: "Technology".to_string(),
            industry: "Consumer Electronics".to_string(),
            market_cap: "2.95T".to_string(),
            beta: "1.29".to_string(),
            summary: "Apple designs smartphones.".to_string(),
            income: Some(IncomeSummary {
                revenue: "383.29B".to_string(),
                gross_profit: "169.15B".to_string(),
                net_income: "97.00B".to_string(),
            }),
            cash_flow: None,
            ratios: Ratios {
                trailing_pe: "29.50".to_string(),
                price_to_book: "47.10".to_string(),
                dividend_yield: "0.51%".to_string(),
                return_on_equity: "147.25%".to_string(),
            },
            indicators: vec![("RSI(14)".to_string(), "55.00 (neutral)".to_string())],
            provider_news: vec![Headline {
                title: "Apple beats estimates".to_string(),
                publisher: "Reuters".to_string(),
                published: Some("2024-02-01 21:30 UTC".to_string()),
            }],
            search_news: Vec::new(),
            search_note: Some("News search failed: timeout".to_string()),
        }
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::English);
        assert_eq!("中文".parse::<Language>().unwrap(), Language::Chinese);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_english_analysis_prompt() {
        let library = PromptLibrary::new().unwrap();
        let prompt = library
            .analysis_prompt(Language::English, &context())
            .unwrap();

        assert!(prompt.contains("Apple Inc. (AAPL)"));
        assert!(prompt.contains("Total revenue: 383.29B"));
        assert!(!prompt.contains("Operating cash flow"));
        assert!(prompt.contains("1. Apple beats estimates (source: Reuters, published 2024-02-01 21:30 UTC)"));
        assert!(!prompt.contains("External news (search)"));
        assert!(prompt.contains("News search note: News search failed: timeout"));
        assert!(prompt.contains("RSI(14): 55.00 (neutral)"));
        assert!(prompt.contains("Avoid direct investment advice"));
    }

    #[test]
    fn test_chinese_analysis_prompt() {
        let library = PromptLibrary::new().unwrap();
        let prompt = library
            .analysis_prompt(Language::Chinese, &context())
            .unwrap();

        assert!(prompt.contains("Apple Inc. (AAPL)"));
        assert!(prompt.contains("繁體中文"));
        assert!(prompt.contains("總營收: 383.29B"));
    }

    #[test]
    fn test_system_prompts_render() {
        let library = PromptLibrary::new().unwrap();
        for language in [Language::English, Language::Chinese] {
            assert!(!library.system_prompt(language).unwrap().is_empty());
        }
    }
}

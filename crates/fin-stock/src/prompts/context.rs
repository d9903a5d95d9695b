//! Data rendered into the analysis prompt

use crate::format::{self, NOT_AVAILABLE};
use crate::indicators::{IndicatorConfig, IndicatorSet};
use crate::market::{MarketSnapshot, NewsItem};
use crate::news::NewsDigest;
use serde::Serialize;

/// Characters of the business summary kept in the prompt
const SUMMARY_CHARS: usize = 700;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeSummary {
    pub revenue: String,
    pub gross_profit: String,
    pub net_income: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowSummary {
    pub operating: String,
    pub free: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ratios {
    pub trailing_pe: String,
    pub price_to_book: String,
    pub dividend_yield: String,
    pub return_on_equity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub title: String,
    pub publisher: String,
    pub published: Option<String>,
}

impl From<&NewsItem> for Headline {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            publisher: item.publisher.clone(),
            published: item
                .published
                .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string()),
        }
    }
}

/// Pre-formatted values for the analysis template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisContext {
    pub company: String,
    pub ticker: String,
    pub period: String,
    pub latest_close: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: String,
    pub beta: String,
    pub summary: String,
    pub income: Option<IncomeSummary>,
    pub cash_flow: Option<CashFlowSummary>,
    pub ratios: Ratios,
    pub indicators: Vec<(String, String)>,
    pub provider_news: Vec<Headline>,
    pub search_news: Vec<Headline>,
    /// Present only when the search failed, not when it was skipped
    pub search_note: Option<String>,
}

impl AnalysisContext {
    pub fn build(
        snapshot: &MarketSnapshot,
        digest: &NewsDigest,
        indicators: &IndicatorSet,
        indicator_config: &IndicatorConfig,
        news_limit: usize,
    ) -> Self {
        let info = &snapshot.info;
        let text = |key: &str| info.text(key).unwrap_or(NOT_AVAILABLE).to_string();

        let income = snapshot.financials.income.latest().map(|_| {
            let statement = &snapshot.financials.income;
            IncomeSummary {
                revenue: format::large_number(statement.latest_value(&["totalRevenue"])),
                gross_profit: format::large_number(statement.latest_value(&["grossProfit"])),
                net_income: format::large_number(statement.latest_value(&["netIncome"])),
            }
        });

        let cash_flow = snapshot.financials.cash_flow.latest().map(|_| CashFlowSummary {
            operating: format::large_number(snapshot.financials.operating_cash_flow()),
            free: format::large_number(snapshot.financials.free_cash_flow()),
        });

        let summary = info
            .text("longBusinessSummary")
            .map_or_else(|| NOT_AVAILABLE.to_string(), |s| {
                format::truncate_chars(s, SUMMARY_CHARS)
            });

        Self {
            company: snapshot.company_name().to_string(),
            ticker: snapshot.ticker.clone(),
            period: snapshot.period.to_string(),
            latest_close: format::decimal(snapshot.latest_candle().map(|c| c.close)),
            sector: text("sector"),
            industry: text("industry"),
            market_cap: format::large_number(info.number("marketCap")),
            beta: format::decimal(info.number("beta")),
            summary,
            income,
            cash_flow,
            ratios: Ratios {
                trailing_pe: format::decimal(info.number("trailingPE")),
                price_to_book: format::decimal(info.number("priceToBook")),
                dividend_yield: format::dividend_yield(info.number("dividendYield")),
                return_on_equity: format::ratio_percent(info.number("returnOnEquity")),
            },
            indicators: indicators.latest_readings(indicator_config),
            provider_news: digest
                .provider
                .iter()
                .take(news_limit)
                .map(Headline::from)
                .collect(),
            search_news: digest
                .search
                .iter()
                .take(news_limit)
                .map(Headline::from)
                .collect(),
            search_note: digest
                .search_note
                .as_ref()
                .filter(|note| note.is_failure())
                .map(ToString::to_string),
        }
    }
}

//! Dashboard view model
//!
//! Turns a [`SessionState`] into display-ready strings grouped by tab. Nothing
//! here touches the network; the terminal front end only lays these values
//! out.

use crate::chat::ChatRole;
use crate::error::StockError;
use crate::format::{self, NOT_AVAILABLE};
use crate::indicators::{IndicatorSet, interpret_rsi};
use crate::market::{Candle, CompanyInfo, FinancialStatement, MarketSnapshot, NewsItem, Period};
use crate::news::NewsDigest;
use crate::pipeline::AI_KEY_REQUIRED;
use crate::session::{AiState, SessionState};
use std::fmt;
use std::str::FromStr;

/// Bars listed in the price table
pub const PRICE_ROWS: usize = 15;
/// Statement periods shown side by side
const STATEMENT_PERIODS: usize = 4;
const DIVIDEND_ROWS: usize = 5;
const INSTITUTIONAL_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Overview,
    PriceAnalysis,
    Financials,
    Company,
    AiChat,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Overview,
        Tab::PriceAnalysis,
        Tab::Financials,
        Tab::Company,
        Tab::AiChat,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::PriceAnalysis => "Price Analysis",
            Tab::Financials => "Financials",
            Tab::Company => "Company",
            Tab::AiChat => "AI Chat",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Tab {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overview" | "1" => Ok(Tab::Overview),
            "price" | "prices" | "chart" | "2" => Ok(Tab::PriceAnalysis),
            "financials" | "fin" | "3" => Ok(Tab::Financials),
            "company" | "profile" | "news" | "4" => Ok(Tab::Company),
            "ai" | "chat" | "5" => Ok(Tab::AiChat),
            other => Err(StockError::InvalidInput(format!(
                "unknown tab '{other}' (expected overview, price, financials, company or ai)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub label: String,
    pub value: String,
    pub delta: Option<String>,
}

impl Metric {
    fn new(label: &str, value: String) -> Self {
        Self {
            label: label.to_string(),
            value,
            delta: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewTab {
    pub metrics: Vec<Metric>,
    pub period: Period,
    /// First and last bar dates of the period
    pub range: (String, String),
    pub period_change: String,
    pub period_high: String,
    pub period_low: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTab {
    pub columns: Vec<String>,
    /// Most recent bars, newest first
    pub rows: Vec<Vec<String>>,
    pub bars: usize,
    pub readings: Vec<(String, String)>,
    pub rsi_signal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTable {
    pub title: String,
    /// Period end dates, newest first
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinancialsTab {
    pub statements: Vec<StatementTable>,
    pub free_cash_flow: String,
    pub ratios: Vec<(String, String)>,
    pub dividends: Vec<(String, String)>,
    pub dividend_rate: String,
    pub payout_ratio: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsLine {
    pub title: String,
    pub publisher: String,
    pub published: String,
    pub link: String,
}

impl From<&NewsItem> for NewsLine {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            publisher: item.publisher.clone(),
            published: item.published.map_or_else(
                || NOT_AVAILABLE.to_string(),
                |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
            ),
            link: item.link.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyTab {
    pub summary: String,
    pub profile: Vec<(String, String)>,
    pub major_holders: Vec<(String, String)>,
    pub institutional: Vec<Vec<String>>,
    pub recommendations: Vec<(String, u32)>,
    pub provider_news: Vec<NewsLine>,
    pub search_news: Vec<NewsLine>,
    pub news_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPanel {
    /// No AI key in the session
    KeyRequired(String),
    /// A key is present but the initial analysis did not complete
    Unavailable(String),
    Ready(Vec<(ChatRole, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub ticker: String,
    pub company: String,
    pub overview: OverviewTab,
    pub price: PriceTab,
    pub financials: FinancialsTab,
    pub company_tab: CompanyTab,
    pub chat: ChatPanel,
}

impl Dashboard {
    /// `None` until a snapshot is loaded
    pub fn build(state: &SessionState) -> Option<Self> {
        let snapshot = state.snapshot()?;
        let empty = IndicatorSet::default();
        let indicators = state.indicators().unwrap_or(&empty);

        Some(Self {
            ticker: snapshot.ticker.clone(),
            company: snapshot.company_name().to_string(),
            overview: overview(snapshot),
            price: price_tab(snapshot, indicators, state),
            financials: financials_tab(snapshot),
            company_tab: company_tab(snapshot, state.news()),
            chat: chat_panel(state),
        })
    }

    pub fn header(&self) -> String {
        format!("{} ({})", self.company, self.ticker)
    }
}

fn overview(snapshot: &MarketSnapshot) -> OverviewTab {
    let info = &snapshot.info;
    let latest = snapshot.latest_candle().map(|c| c.close);
    let current = info
        .number("currentPrice")
        .or_else(|| info.number("regularMarketPrice"))
        .or(latest);

    let mut price = Metric::new("Current Price", format::decimal(current));
    price.delta = format::price_delta(
        current,
        info.number("regularMarketChange"),
        info.number("regularMarketPreviousClose"),
        info.number("regularMarketChangePercent"),
    );

    let metrics = vec![
        price,
        Metric::new("Market Cap", format::market_cap(info.number("marketCap"))),
        Metric::new("P/E (TTM)", format::decimal(info.number("trailingPE"))),
        Metric::new("EPS (TTM)", format::decimal(info.number("trailingEps"))),
        Metric::new("P/B", format::decimal(info.number("priceToBook"))),
        Metric::new(
            "Dividend Yield",
            format::dividend_yield(info.number("dividendYield")),
        ),
        Metric::new("Beta", format::decimal(info.number("beta"))),
        Metric::new("Volume", volume(info)),
    ];

    let first = snapshot.candles.first();
    let range = (
        first.map_or_else(|| NOT_AVAILABLE.to_string(), date),
        snapshot
            .latest_candle()
            .map_or_else(|| NOT_AVAILABLE.to_string(), date),
    );
    let period_change = match (first.map(|c| c.close), latest) {
        (Some(start), Some(end)) if start != 0.0 => {
            format!("{:+.2}%", (end - start) / start * 100.0)
        }
        _ => NOT_AVAILABLE.to_string(),
    };
    let high = snapshot.candles.iter().map(|c| c.high).reduce(f64::max);
    let low = snapshot.candles.iter().map(|c| c.low).reduce(f64::min);

    OverviewTab {
        metrics,
        period: snapshot.period,
        range,
        period_change,
        period_high: format::decimal(high),
        period_low: format::decimal(low),
        warnings: snapshot.warnings.clone(),
    }
}

fn volume(info: &CompanyInfo) -> String {
    info.number("regularMarketVolume")
        .filter(|v| *v >= 0.0)
        .map_or_else(|| NOT_AVAILABLE.to_string(), |v| thousands(v.round()))
}

/// `1234567` as `1,234,567`
fn thousands(value: f64) -> String {
    group_digits(&format!("{value:.0}"))
}

fn group_digits(number: &str) -> String {
    let (sign, digits) = number
        .strip_prefix('-')
        .map_or(("", number), |d| ("-", d));
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("{sign}{out}")
}

fn date(candle: &Candle) -> String {
    candle.timestamp.format("%Y-%m-%d").to_string()
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn price_tab(snapshot: &MarketSnapshot, set: &IndicatorSet, state: &SessionState) -> PriceTab {
    let config = state.indicator_config();
    let mut columns: Vec<String> = ["Date", "Open", "High", "Low", "Close", "Volume"]
        .into_iter()
        .map(String::from)
        .collect();

    let mut series: Vec<&[Option<f64>]> = Vec::new();
    if let Some(s) = &set.sma {
        columns.push(format!("SMA({})", config.sma.window));
        series.push(s);
    }
    if let Some(s) = &set.ema {
        columns.push(format!("EMA({})", config.ema.window));
        series.push(s);
    }
    if let Some(s) = &set.rsi {
        columns.push(format!("RSI({})", config.rsi.window));
        series.push(s);
    }
    if let Some(m) = &set.macd {
        columns.extend(["MACD", "Signal", "Hist"].map(String::from));
        series.extend([m.macd.as_slice(), m.signal.as_slice(), m.histogram.as_slice()]);
    }
    if let Some(b) = &set.bollinger {
        columns.extend(["BB Upper", "BB Lower"].map(String::from));
        series.extend([b.upper.as_slice(), b.lower.as_slice()]);
    }

    let rows = snapshot
        .candles
        .iter()
        .enumerate()
        .rev()
        .take(PRICE_ROWS)
        .map(|(i, c)| {
            let mut row = vec![
                date(c),
                format!("{:.2}", c.open),
                format!("{:.2}", c.high),
                format!("{:.2}", c.low),
                format!("{:.2}", c.close),
                c.volume
                    .map_or_else(|| "-".to_string(), |v| group_digits(&v.to_string())),
            ];
            row.extend(series.iter().map(|s| cell(s.get(i).copied().flatten())));
            row
        })
        .collect();

    let rsi_signal = set
        .latest_rsi()
        .map(|v| format!("RSI {v:.2}: {}", interpret_rsi(v)));

    PriceTab {
        columns,
        rows,
        bars: snapshot.candles.len(),
        readings: set.latest_readings(config),
        rsi_signal,
    }
}

/// `totalRevenue` as `Total Revenue`
fn humanize(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 8);
    for (i, ch) in key.chars().enumerate() {
        if i == 0 {
            out.extend(ch.to_uppercase());
        } else {
            if ch.is_uppercase() && !out.ends_with(' ') {
                out.push(' ');
            }
            out.push(ch);
        }
    }
    out
}

fn statement_table(statement: &FinancialStatement) -> StatementTable {
    let periods: Vec<_> = statement.periods.iter().take(STATEMENT_PERIODS).collect();
    let rows = statement
        .line_items()
        .into_iter()
        .map(|item| {
            let values = periods
                .iter()
                .map(|p| format::large_number(p.items.get(item).copied()))
                .collect();
            (humanize(item), values)
        })
        .collect();

    StatementTable {
        title: statement.kind.to_string(),
        columns: periods
            .iter()
            .map(|p| p.end_date.format("%Y-%m-%d").to_string())
            .collect(),
        rows,
    }
}

const RATIOS: [(&str, &str); 16] = [
    ("Trailing P/E", "trailingPE"),
    ("Forward P/E", "forwardPE"),
    ("Trailing EPS", "trailingEps"),
    ("Forward EPS", "forwardEps"),
    ("P/B Ratio", "priceToBook"),
    ("P/S Ratio (TTM)", "priceToSalesTrailing12Months"),
    ("ROE (TTM)", "returnOnEquity"),
    ("ROA (TTM)", "returnOnAssets"),
    ("Gross Margin", "grossMargins"),
    ("Operating Margin", "operatingMargins"),
    ("Profit Margin", "profitMargins"),
    ("Debt/Equity", "debtToEquity"),
    ("Current Ratio", "currentRatio"),
    ("Quick Ratio", "quickRatio"),
    ("EV/Revenue", "enterpriseToRevenue"),
    ("EV/EBITDA", "enterpriseToEbitda"),
];

fn financials_tab(snapshot: &MarketSnapshot) -> FinancialsTab {
    let info = &snapshot.info;
    let financials = &snapshot.financials;

    let statements = [
        &financials.income,
        &financials.balance_sheet,
        &financials.cash_flow,
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .map(statement_table)
    .collect();

    let ratios = RATIOS
        .iter()
        .map(|(label, key)| {
            let value = if format::is_percent_label(label) {
                format::ratio_percent(info.number(key))
            } else {
                format::decimal(info.number(key))
            };
            ((*label).to_string(), value)
        })
        .collect();

    let dividends = snapshot
        .dividends
        .iter()
        .rev()
        .take(DIVIDEND_ROWS)
        .map(|d| (d.date.format("%Y-%m-%d").to_string(), format!("{:.4}", d.amount)))
        .collect();

    FinancialsTab {
        statements,
        free_cash_flow: format::large_number(financials.free_cash_flow()),
        ratios,
        dividends,
        dividend_rate: format::decimal(info.number("dividendRate")),
        payout_ratio: format::ratio_percent(info.number("payoutRatio")),
    }
}

const PROFILE_FIELDS: [(&str, &str); 6] = [
    ("Sector", "sector"),
    ("Industry", "industry"),
    ("Country", "country"),
    ("Website", "website"),
    ("Exchange", "exchange"),
    ("Currency", "currency"),
];

fn company_tab(snapshot: &MarketSnapshot, news: Option<&NewsDigest>) -> CompanyTab {
    let info = &snapshot.info;

    let mut profile: Vec<(String, String)> = PROFILE_FIELDS
        .iter()
        .map(|(label, key)| {
            (
                (*label).to_string(),
                info.text(key).unwrap_or(NOT_AVAILABLE).to_string(),
            )
        })
        .collect();
    profile.push((
        "Employees".to_string(),
        info.number("fullTimeEmployees")
            .map_or_else(|| NOT_AVAILABLE.to_string(), thousands),
    ));

    let major_holders = snapshot
        .holders
        .major
        .iter()
        .map(|(label, value)| {
            let shown = if label.contains("Count") {
                format!("{value:.0}")
            } else {
                format::ratio_percent(Some(*value))
            };
            (label.clone(), shown)
        })
        .collect();

    let institutional = snapshot
        .holders
        .institutional
        .iter()
        .take(INSTITUTIONAL_ROWS)
        .map(|h| {
            vec![
                h.holder.clone(),
                format::large_number(h.shares),
                format::ratio_percent(h.pct_held),
                h.reported
                    .map_or_else(|| NOT_AVAILABLE.to_string(), |d| d.to_string()),
            ]
        })
        .collect();

    let recommendations = snapshot
        .current_recommendation()
        .map(|r| {
            r.counts()
                .into_iter()
                .map(|(label, n)| (label.to_string(), n))
                .collect()
        })
        .unwrap_or_default();

    let (provider_news, search_news, news_note) = match news {
        Some(digest) => (
            digest.provider.iter().map(NewsLine::from).collect(),
            digest.search.iter().map(NewsLine::from).collect(),
            digest.search_note.as_ref().map(ToString::to_string),
        ),
        None => (Vec::new(), Vec::new(), None),
    };

    CompanyTab {
        summary: info
            .text("longBusinessSummary")
            .unwrap_or("No business description available.")
            .to_string(),
        profile,
        major_holders,
        institutional,
        recommendations,
        provider_news,
        search_news,
        news_note,
    }
}

fn chat_panel(state: &SessionState) -> ChatPanel {
    match state.ai() {
        AiState::AnalysisReady => ChatPanel::Ready(
            state
                .chat()
                .messages()
                .iter()
                .map(|m| (m.role, m.text.clone()))
                .collect(),
        ),
        AiState::NoAnalysis if state.keys().ai.is_none() => {
            ChatPanel::KeyRequired(AI_KEY_REQUIRED.to_string())
        }
        AiState::NoAnalysis => ChatPanel::Unavailable(
            "The AI analysis did not complete; run analyze again to retry".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_parse() {
        assert_eq!("price".parse::<Tab>().unwrap(), Tab::PriceAnalysis);
        assert_eq!("AI".parse::<Tab>().unwrap(), Tab::AiChat);
        assert_eq!("4".parse::<Tab>().unwrap(), Tab::Company);
        assert!("charts!".parse::<Tab>().is_err());
        assert_eq!(Tab::ALL.len(), 5);
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.0), "999");
        assert_eq!(thousands(1_234_567.0), "1,234,567");
        assert_eq!(thousands(-12_345.0), "-12,345");
        assert_eq!(group_digits("1000"), "1,000");
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("totalRevenue"), "Total Revenue");
        assert_eq!(humanize("netIncome"), "Net Income");
        assert_eq!(humanize("ebit"), "Ebit");
    }

    #[test]
    fn test_no_dashboard_without_snapshot() {
        assert!(Dashboard::build(&SessionState::default()).is_none());
    }

    #[test]
    fn test_chat_panel_key_required() {
        let state = SessionState::default();
        assert_eq!(
            chat_panel(&state),
            ChatPanel::KeyRequired(AI_KEY_REQUIRED.to_string())
        );
    }
}

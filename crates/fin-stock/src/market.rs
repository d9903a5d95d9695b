//! Market data model shared by the fetcher, indicators, narrator and dashboard

use crate::error::StockError;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Chart period selectable by the user
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Period {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "YTD")]
    YearToDate,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "2Y")]
    #[default]
    TwoYears,
    #[serde(rename = "5Y")]
    FiveYears,
    #[serde(rename = "All")]
    All,
}

impl Period {
    /// Every period in display order
    pub const ALL: [Period; 8] = [
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::YearToDate,
        Period::OneYear,
        Period::TwoYears,
        Period::FiveYears,
        Period::All,
    ];

    /// Short label as shown in the period selector
    pub fn label(self) -> &'static str {
        match self {
            Period::OneMonth => "1M",
            Period::ThreeMonths => "3M",
            Period::SixMonths => "6M",
            Period::YearToDate => "YTD",
            Period::OneYear => "1Y",
            Period::TwoYears => "2Y",
            Period::FiveYears => "5Y",
            Period::All => "All",
        }
    }

    /// Fixed lookback in days, `None` for calendar-anchored or unbounded periods
    pub fn lookback_days(self) -> Option<i64> {
        match self {
            Period::OneMonth => Some(30),
            Period::ThreeMonths => Some(90),
            Period::SixMonths => Some(180),
            Period::OneYear => Some(365),
            Period::TwoYears => Some(730),
            Period::FiveYears => Some(1825),
            Period::YearToDate | Period::All => None,
        }
    }

    /// Start of the window relative to `now`, in `now`'s timezone
    ///
    /// Returns `None` for [`Period::All`], meaning the earliest available bar.
    pub fn start_from<Tz: TimeZone>(self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        if let Some(days) = self.lookback_days() {
            return Some(now.clone() - chrono::Duration::days(days));
        }

        match self {
            Period::YearToDate => {
                let jan1 = NaiveDate::from_ymd_opt(now.year(), 1, 1)?.and_hms_opt(0, 0, 0)?;
                now.timezone().from_local_datetime(&jan1).earliest()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Period {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1m" | "1mo" => Ok(Period::OneMonth),
            "3m" | "3mo" => Ok(Period::ThreeMonths),
            "6m" | "6mo" => Ok(Period::SixMonths),
            "ytd" => Ok(Period::YearToDate),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "all" | "max" => Ok(Period::All),
            other => Err(StockError::InvalidInput(format!(
                "unknown period '{other}' (expected one of 1M, 3M, 6M, YTD, 1Y, 2Y, 5Y, All)"
            ))),
        }
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// `None` when the provider reported no volume for the bar
    pub volume: Option<u64>,
}

/// Price history as returned by a provider, before timezone normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    pub candles: Vec<Candle>,
    /// IANA name of the exchange timezone if the provider reported one
    pub timezone: Option<String>,
}

/// Flattened company profile and key statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    fields: BTreeMap<String, serde_json::Value>,
}

impl CompanyInfo {
    /// Build from a JSON object, keeping only non-null scalars
    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = map
            .into_iter()
            .filter(|(_, v)| is_scalar(v))
            .collect();
        Self { fields }
    }

    /// Insert a field unless one with the same key is already present
    pub fn insert_missing(&mut self, key: impl Into<String>, value: serde_json::Value) {
        if !is_scalar(&value) {
            return;
        }
        self.fields.entry(key.into()).or_insert(value);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Numeric field, `None` when absent, non-numeric or not finite
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields
            .get(key)
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite())
    }

    /// Non-empty text field
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Long name, falling back to the short name
    pub fn name(&self) -> Option<&str> {
        self.text("longName").or_else(|| self.text("shortName"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.fields.iter()
    }
}

fn is_scalar(value: &serde_json::Value) -> bool {
    !(value.is_null() || value.is_object() || value.is_array())
}

/// Which of the three statements a [`FinancialStatement`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Income,
    BalanceSheet,
    CashFlow,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatementKind::Income => "Income Statement",
            StatementKind::BalanceSheet => "Balance Sheet",
            StatementKind::CashFlow => "Cash Flow",
        })
    }
}

/// Line items reported for one fiscal year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub end_date: NaiveDate,
    pub items: BTreeMap<String, f64>,
}

/// Annual statement, newest period first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub kind: StatementKind,
    pub periods: Vec<StatementPeriod>,
}

impl FinancialStatement {
    pub fn empty(kind: StatementKind) -> Self {
        Self {
            kind,
            periods: Vec::new(),
        }
    }

    /// Sort periods newest first
    pub fn sort_newest_first(&mut self) {
        self.periods.sort_by(|a, b| b.end_date.cmp(&a.end_date));
    }

    pub fn is_empty(&self) -> bool {
        self.periods.iter().all(|p| p.items.is_empty())
    }

    pub fn latest(&self) -> Option<&StatementPeriod> {
        self.periods.first()
    }

    /// Value from the latest period, trying each alias in order
    pub fn latest_value(&self, aliases: &[&str]) -> Option<f64> {
        let latest = self.latest()?;
        aliases.iter().find_map(|k| latest.items.get(*k).copied())
    }

    /// Union of line-item names across periods
    pub fn line_items(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .periods
            .iter()
            .flat_map(|p| p.items.keys().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Income statement, balance sheet and cash flow together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub income: FinancialStatement,
    pub balance_sheet: FinancialStatement,
    pub cash_flow: FinancialStatement,
}

impl Default for Financials {
    fn default() -> Self {
        Self {
            income: FinancialStatement::empty(StatementKind::Income),
            balance_sheet: FinancialStatement::empty(StatementKind::BalanceSheet),
            cash_flow: FinancialStatement::empty(StatementKind::CashFlow),
        }
    }
}

impl Financials {
    pub fn is_empty(&self) -> bool {
        self.income.is_empty() && self.balance_sheet.is_empty() && self.cash_flow.is_empty()
    }

    /// Reported free cash flow, or operating cash flow plus capital expenditure
    pub fn free_cash_flow(&self) -> Option<f64> {
        if let Some(fcf) = self.cash_flow.latest_value(&["freeCashFlow", "Free Cash Flow"]) {
            return Some(fcf);
        }
        let operating = self.operating_cash_flow()?;
        let capex = self
            .cash_flow
            .latest_value(&["capitalExpenditures", "Capital Expenditure"])?;
        Some(operating + capex)
    }

    pub fn operating_cash_flow(&self) -> Option<f64> {
        self.cash_flow.latest_value(&[
            "totalCashFromOperatingActivities",
            "operatingCashflow",
            "Operating Cash Flow",
        ])
    }
}

/// Institutional holder row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionalHolder {
    pub holder: String,
    pub shares: Option<f64>,
    pub value: Option<f64>,
    pub pct_held: Option<f64>,
    pub reported: Option<NaiveDate>,
}

/// Ownership breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holders {
    /// Ordered (label, value) pairs such as insider and institutional percentages
    pub major: Vec<(String, f64)>,
    pub institutional: Vec<InstitutionalHolder>,
}

impl Holders {
    pub fn is_empty(&self) -> bool {
        self.major.is_empty() && self.institutional.is_empty()
    }
}

/// Analyst recommendation counts for one period (e.g. `0m`, `-1m`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationTrend {
    pub period: String,
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

impl RecommendationTrend {
    /// Non-zero (label, count) pairs
    pub fn counts(&self) -> Vec<(&'static str, u32)> {
        [
            ("Strong Buy", self.strong_buy),
            ("Buy", self.buy),
            ("Hold", self.hold),
            ("Sell", self.sell),
            ("Strong Sell", self.strong_sell),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect()
    }

    /// Sum of all counts, capped at `u32::MAX`
    pub fn total(&self) -> u32 {
        [self.buy, self.hold, self.sell, self.strong_sell]
            .into_iter()
            .fold(self.strong_buy, u32::saturating_add)
    }
}

/// Cash dividend paid on a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Where a headline came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsSource {
    /// The market-data provider's own feed
    Provider,
    /// The external search API
    Search,
}

/// A news headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub publisher: String,
    pub published: Option<DateTime<Utc>>,
    pub source: NewsSource,
}

/// Everything fetched for one (ticker, period)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub period: Period,
    pub fetched_at: DateTime<Utc>,
    /// IANA name of the timezone the candles are expressed in
    pub timezone: String,
    pub candles: Vec<Candle>,
    pub info: CompanyInfo,
    pub financials: Financials,
    pub holders: Holders,
    pub recommendations: Vec<RecommendationTrend>,
    pub dividends: Vec<Dividend>,
    pub news: Vec<NewsItem>,
    /// Data-quality notes and degraded sections
    pub warnings: Vec<String>,
}

impl MarketSnapshot {
    /// Company display name, the ticker if the profile has none
    pub fn company_name(&self) -> &str {
        self.info.name().unwrap_or(&self.ticker)
    }

    pub fn latest_candle(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Close of the second-to-last bar
    pub fn previous_close(&self) -> Option<f64> {
        let n = self.candles.len();
        (n >= 2).then(|| self.candles[n - 2].close)
    }

    /// Current recommendation row: period `0m`, else the last row
    pub fn current_recommendation(&self) -> Option<&RecommendationTrend> {
        self.recommendations
            .iter()
            .find(|r| r.period == "0m")
            .or_else(|| self.recommendations.last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse_and_display() {
        assert_eq!("1y".parse::<Period>().unwrap(), Period::OneYear);
        assert_eq!("YTD".parse::<Period>().unwrap(), Period::YearToDate);
        assert_eq!("max".parse::<Period>().unwrap(), Period::All);
        assert_eq!(Period::TwoYears.to_string(), "2Y");
        assert_eq!(Period::default(), Period::TwoYears);
        assert!(matches!(
            "7y".parse::<Period>(),
            Err(StockError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_period_windows() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

        let start = Period::OneMonth.start_from(&now).unwrap();
        assert_eq!((now - start).num_days(), 30);

        let start = Period::FiveYears.start_from(&now).unwrap();
        assert_eq!((now - start).num_days(), 1825);

        let start = Period::YearToDate.start_from(&now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        assert!(Period::All.start_from(&now).is_none());
    }

    #[test]
    fn test_ytd_uses_exchange_timezone() {
        let ny = chrono_tz::America::New_York;
        let now = ny.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();
        let start = Period::YearToDate.start_from(&now).unwrap();
        assert_eq!(start.naive_local().to_string(), "2024-01-01 00:00:00");
        assert_eq!(start.with_timezone(&Utc).to_rfc3339(), "2024-01-01T05:00:00+00:00");
    }

    #[test]
    fn test_company_info_accessors() {
        let map = serde_json::json!({
            "longName": "Apple Inc.",
            "shortName": "Apple",
            "marketCap": 3.0e12,
            "sector": "  ",
            "officers": {"nested": true},
            "beta": null
        });
        let serde_json::Value::Object(map) = map else {
            panic!("expected object");
        };
        let info = CompanyInfo::from_map(map);

        assert_eq!(info.name(), Some("Apple Inc."));
        assert_eq!(info.number("marketCap"), Some(3.0e12));
        assert_eq!(info.text("sector"), None);
        assert!(info.get("officers").is_none());
        assert!(info.get("beta").is_none());
    }

    #[test]
    fn test_free_cash_flow_fallback() {
        let mut items = BTreeMap::new();
        items.insert("totalCashFromOperatingActivities".to_string(), 100.0);
        items.insert("capitalExpenditures".to_string(), -30.0);
        let financials = Financials {
            cash_flow: FinancialStatement {
                kind: StatementKind::CashFlow,
                periods: vec![StatementPeriod {
                    end_date: NaiveDate::from_ymd_opt(2023, 9, 30).unwrap(),
                    items,
                }],
            },
            ..Default::default()
        };

        assert_eq!(financials.free_cash_flow(), Some(70.0));
    }

    #[test]
    fn test_statement_sorted_newest_first() {
        let period = |y| StatementPeriod {
            end_date: NaiveDate::from_ymd_opt(y, 12, 31).unwrap(),
            items: BTreeMap::from([("netIncome".to_string(), f64::from(y))]),
        };
        let mut statement = FinancialStatement {
            kind: StatementKind::Income,
            periods: vec![period(2021), period(2023), period(2022)],
        };
        statement.sort_newest_first();

        assert_eq!(statement.latest_value(&["netIncome"]), Some(2023.0));
        assert_eq!(statement.line_items(), vec!["netIncome"]);
    }

    #[test]
    fn test_recommendation_counts_skip_zero() {
        let trend = RecommendationTrend {
            period: "0m".to_string(),
            strong_buy: 5,
            buy: 10,
            hold: 0,
            sell: 1,
            strong_sell: 0,
        };
        assert_eq!(
            trend.counts(),
            vec![("Strong Buy", 5), ("Buy", 10), ("Sell", 1)]
        );
        assert_eq!(trend.total(), 16);
    }

    #[test]
    fn test_recommendation_total_saturates() {
        let trend = RecommendationTrend {
            period: "0m".to_string(),
            strong_buy: u32::MAX,
            buy: u32::MAX,
            hold: 3,
            ..Default::default()
        };
        assert_eq!(trend.total(), u32::MAX);
    }
}

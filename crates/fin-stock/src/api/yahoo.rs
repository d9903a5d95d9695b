//! Yahoo Finance API client

use super::MarketDataProvider;
use crate::error::{Result, StockError};
use crate::market::{
    Candle, CompanyInfo, Dividend, FinancialStatement, Financials, Holders, InstitutionalHolder,
    NewsItem, NewsSource, Period, PriceHistory, RecommendationTrend, StatementKind,
    StatementPeriod,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Host that hands out the session cookie required by `quoteSummary`
const COOKIE_URL: &str = "https://fc.yahoo.com";

const PROFILE_MODULES: &[&str] = &[
    "price",
    "summaryDetail",
    "defaultKeyStatistics",
    "financialData",
    "assetProfile",
];

const STATEMENT_MODULES: &[&str] = &[
    "incomeStatementHistory",
    "balanceSheetHistory",
    "cashflowStatementHistory",
];

/// Yahoo Finance API client
///
/// Prices come through `yahoo_finance_api`; fundamentals, dividends and
/// news are read from the JSON endpoints directly.
pub struct YahooFinanceClient {
    connector: yahoo::YahooConnector,
    http: Client,
    base_url: String,
    crumb: Mutex<Option<String>>,
}

impl YahooFinanceClient {
    /// Create a client against the public query host
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://query2.finance.yahoo.com")
    }

    /// Create a client against a specific query host
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            connector,
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            crumb: Mutex::new(None),
        })
    }

    async fn crumb(&self) -> Result<String> {
        let mut crumb = self.crumb.lock().await;
        if let Some(c) = crumb.as_ref() {
            return Ok(c.clone());
        }

        // Only the cookie matters, the response itself is a 404
        if let Err(e) = self.http.get(COOKIE_URL).send().await {
            debug!(error = %e, "Yahoo cookie fetch failed");
        }

        let value = self
            .http
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let value = value.trim().to_string();
        if value.is_empty() || value.contains('<') {
            return Err(StockError::YahooFinanceError(
                "could not obtain a session crumb".to_string(),
            ));
        }

        debug!("Obtained Yahoo session crumb");
        *crumb = Some(value.clone());
        Ok(value)
    }

    /// Fetch `quoteSummary` modules and return the flattened result object
    async fn quote_summary(&self, ticker: &str, modules: &[&str]) -> Result<Value> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v10/finance/quoteSummary/{ticker}", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("modules", modules.join(",")), ("crumb", crumb)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Stale crumb, fetch a fresh one next time
            *self.crumb.lock().await = None;
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StockError::RateLimitExceeded {
                provider: "Yahoo Finance".to_string(),
            });
        }

        let body: Value = response.json().await?;
        summary_result(body, status)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self.http.get(url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StockError::ApiError(format!(
                "Yahoo Finance error {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn price_history(&self, ticker: &str, period: Period) -> Result<PriceHistory> {
        let response = if let Some(start) = period.start_from(&Utc::now()) {
            // One day of slack: the fetcher trims against the exchange calendar
            let start = start - chrono::Duration::days(1);
            let start = OffsetDateTime::from_unix_timestamp(start.timestamp()).map_err(|e| {
                StockError::YahooFinanceError(format!("Invalid start timestamp: {e}"))
            })?;
            self.connector
                .get_quote_history(ticker, start, OffsetDateTime::now_utc())
                .await
        } else {
            self.connector.get_quote_range(ticker, "1d", "max").await
        }
        .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let timezone = response
            .metadata()
            .ok()
            .map(|m| m.exchange_timezone_name)
            .filter(|tz| !tz.is_empty());

        let quotes = response
            .quotes()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let candles = quotes
            .iter()
            .filter_map(|q| {
                let ts = DateTime::from_timestamp(q.timestamp as i64, 0)?;
                Some(Candle {
                    timestamp: ts.fixed_offset(),
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: Some(q.volume),
                })
            })
            .collect::<Vec<_>>();

        debug!(bars = candles.len(), ?timezone, "Fetched price history");
        Ok(PriceHistory { candles, timezone })
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn company_info(&self, ticker: &str) -> Result<CompanyInfo> {
        let result = self.quote_summary(ticker, PROFILE_MODULES).await?;
        Ok(parse_company_info(&result))
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn financials(&self, ticker: &str) -> Result<Financials> {
        let result = self.quote_summary(ticker, STATEMENT_MODULES).await?;
        Ok(parse_financials(&result))
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn holders(&self, ticker: &str) -> Result<Holders> {
        let result = self
            .quote_summary(ticker, &["majorHoldersBreakdown", "institutionOwnership"])
            .await?;
        Ok(parse_holders(&result))
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn recommendations(&self, ticker: &str) -> Result<Vec<RecommendationTrend>> {
        let result = self.quote_summary(ticker, &["recommendationTrend"]).await?;
        Ok(parse_recommendations(&result))
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn dividends(&self, ticker: &str) -> Result<Vec<Dividend>> {
        let url = format!("{}/v8/finance/chart/{ticker}", self.base_url);
        let body = self
            .get_json(
                &url,
                &[
                    ("range", "max".to_string()),
                    ("interval", "3mo".to_string()),
                    ("events", "div".to_string()),
                ],
            )
            .await?;
        Ok(parse_dividends(&body))
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn news(&self, ticker: &str, count: usize) -> Result<Vec<NewsItem>> {
        let url = format!("{}/v1/finance/search", self.base_url);
        let body = self
            .get_json(
                &url,
                &[
                    ("q", ticker.to_string()),
                    ("quotesCount", "0".to_string()),
                    ("newsCount", count.to_string()),
                ],
            )
            .await?;
        Ok(parse_news(&body))
    }

    fn name(&self) -> &str {
        "Yahoo Finance"
    }
}

/// Replace `{"raw": x, "fmt": ...}` wrappers with `x` and `{}` with null
pub(crate) fn flatten_raw(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                return Value::Null;
            }
            if let Some(raw) = map.get("raw") {
                return raw.clone();
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, flatten_raw(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(flatten_raw).collect()),
        other => other,
    }
}

fn summary_result(body: Value, status: reqwest::StatusCode) -> Result<Value> {
    let summary = body.get("quoteSummary").cloned().unwrap_or(Value::Null);

    if let Some(err) = summary.get("error").filter(|e| !e.is_null()) {
        let description = err
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(StockError::YahooFinanceError(format!(
            "{status}: {description}"
        )));
    }

    summary
        .get("result")
        .and_then(|r| r.get(0))
        .cloned()
        .map(flatten_raw)
        .ok_or_else(|| StockError::YahooFinanceError(format!("{status}: empty quoteSummary")))
}

fn date_from_unix(value: &Value) -> Option<NaiveDate> {
    let secs = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

fn parse_company_info(result: &Value) -> CompanyInfo {
    let mut info = CompanyInfo::default();
    for module in PROFILE_MODULES {
        if let Some(Value::Object(fields)) = result.get(*module) {
            for (key, value) in fields {
                if key != "maxAge" {
                    info.insert_missing(key.clone(), value.clone());
                }
            }
        }
    }
    info
}

fn parse_statement(result: &Value, module: &str, list: &str, kind: StatementKind) -> FinancialStatement {
    let periods = result
        .get(module)
        .and_then(|m| m.get(list))
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let end_date = date_from_unix(row.get("endDate")?)?;
                    let items = row
                        .as_object()?
                        .iter()
                        .filter(|(k, _)| *k != "endDate" && *k != "maxAge")
                        .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                        .collect();
                    Some(StatementPeriod { end_date, items })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut statement = FinancialStatement { kind, periods };
    statement.sort_newest_first();
    statement
}

fn parse_financials(result: &Value) -> Financials {
    Financials {
        income: parse_statement(
            result,
            "incomeStatementHistory",
            "incomeStatementHistory",
            StatementKind::Income,
        ),
        balance_sheet: parse_statement(
            result,
            "balanceSheetHistory",
            "balanceSheetStatements",
            StatementKind::BalanceSheet,
        ),
        cash_flow: parse_statement(
            result,
            "cashflowStatementHistory",
            "cashflowStatements",
            StatementKind::CashFlow,
        ),
    }
}

fn parse_holders(result: &Value) -> Holders {
    const MAJOR: &[(&str, &str)] = &[
        ("insidersPercentHeld", "% of Shares Held by All Insiders"),
        ("institutionsPercentHeld", "% of Shares Held by Institutions"),
        ("institutionsFloatPercentHeld", "% of Float Held by Institutions"),
        ("institutionsCount", "Number of Institutions Holding Shares"),
    ];

    let major = result
        .get("majorHoldersBreakdown")
        .map(|m| {
            MAJOR
                .iter()
                .filter_map(|(key, label)| {
                    m.get(*key)
                        .and_then(Value::as_f64)
                        .map(|v| ((*label).to_string(), v))
                })
                .collect()
        })
        .unwrap_or_default();

    let institutional = result
        .get("institutionOwnership")
        .and_then(|m| m.get("ownershipList"))
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    Some(InstitutionalHolder {
                        holder: row.get("organization")?.as_str()?.to_string(),
                        shares: row.get("position").and_then(Value::as_f64),
                        value: row.get("value").and_then(Value::as_f64),
                        pct_held: row.get("pctHeld").and_then(Value::as_f64),
                        reported: row.get("reportDate").and_then(date_from_unix),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Holders {
        major,
        institutional,
    }
}

fn parse_recommendations(result: &Value) -> Vec<RecommendationTrend> {
    let count = |row: &Value, key: &str| {
        row.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };

    result
        .get("recommendationTrend")
        .and_then(|m| m.get("trend"))
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| RecommendationTrend {
                    period: row
                        .get("period")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    strong_buy: count(row, "strongBuy"),
                    buy: count(row, "buy"),
                    hold: count(row, "hold"),
                    sell: count(row, "sell"),
                    strong_sell: count(row, "strongSell"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_dividends(body: &Value) -> Vec<Dividend> {
    let mut dividends: Vec<Dividend> = body
        .pointer("/chart/result/0/events/dividends")
        .and_then(Value::as_object)
        .map(|events| {
            events
                .values()
                .filter_map(|ev| {
                    Some(Dividend {
                        date: date_from_unix(ev.get("date")?)?,
                        amount: ev.get("amount")?.as_f64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    dividends.sort_by_key(|d| d.date);
    dividends
}

fn parse_news(body: &Value) -> Vec<NewsItem> {
    let text = |item: &Value, key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    body.get("news")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| NewsItem {
                    title: text(item, "title"),
                    link: text(item, "link"),
                    publisher: text(item, "publisher"),
                    published: item
                        .get("providerPublishTime")
                        .and_then(Value::as_i64)
                        .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                    source: NewsSource::Provider,
                })
                .collect()
        })
        .unwrap_or_default()
}

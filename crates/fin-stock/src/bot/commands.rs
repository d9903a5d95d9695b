//! Command parsing for the terminal front end

use crate::dashboard::Tab;
use crate::error::{Result, StockError};
use crate::indicators::IndicatorConfig;
use crate::market::Period;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    Ai,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Macd,
    Bollinger,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorChange {
    Enable(bool),
    Window(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        window: usize,
        std_dev: Option<f64>,
    },
}

/// A parameter or toggle change for one indicator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorCommand {
    pub kind: IndicatorKind,
    pub change: IndicatorChange,
}

impl IndicatorCommand {
    /// Apply to a copy of `config`; setting parameters also enables the indicator
    ///
    /// Range checks happen when the pipeline validates the new config.
    pub fn apply(&self, mut config: IndicatorConfig) -> IndicatorConfig {
        match (self.kind, self.change) {
            (IndicatorKind::Sma, IndicatorChange::Enable(on)) => config.sma.enabled = on,
            (IndicatorKind::Ema, IndicatorChange::Enable(on)) => config.ema.enabled = on,
            (IndicatorKind::Rsi, IndicatorChange::Enable(on)) => config.rsi.enabled = on,
            (IndicatorKind::Macd, IndicatorChange::Enable(on)) => config.macd.enabled = on,
            (IndicatorKind::Bollinger, IndicatorChange::Enable(on)) => {
                config.bollinger.enabled = on;
            }
            (IndicatorKind::Sma, IndicatorChange::Window(w)) => {
                config.sma.enabled = true;
                config.sma.window = w;
            }
            (IndicatorKind::Ema, IndicatorChange::Window(w)) => {
                config.ema.enabled = true;
                config.ema.window = w;
            }
            (IndicatorKind::Rsi, IndicatorChange::Window(w)) => {
                config.rsi.enabled = true;
                config.rsi.window = w;
            }
            (_, IndicatorChange::Macd { fast, slow, signal }) => {
                config.macd.enabled = true;
                config.macd.fast = fast;
                config.macd.slow = slow;
                config.macd.signal = signal;
            }
            (_, IndicatorChange::Bollinger { window, std_dev }) => {
                config.bollinger.enabled = true;
                config.bollinger.window = window;
                if let Some(k) = std_dev {
                    config.bollinger.std_dev = k;
                }
            }
            (IndicatorKind::Macd | IndicatorKind::Bollinger, IndicatorChange::Window(_)) => {}
        }
        config
    }
}

/// Parsed command from user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Analyze a ticker, optionally on a new period
    Analyze {
        ticker: String,
        period: Option<Period>,
    },
    Period(Period),
    SetKey {
        target: KeyTarget,
        key: String,
    },
    ClearKeys,
    Indicator(IndicatorCommand),
    /// Show the current indicator settings
    Indicators,
    Show(Tab),
    Ask(String),
    /// Text that is not a command
    Query(String),
    Reset,
    Help,
    Exit,
}

fn arg<'a>(args: &[&'a str], name: &str) -> Result<&'a str> {
    args.first()
        .copied()
        .ok_or_else(|| StockError::CommandError(format!("Missing argument for {name}")))
}

fn number<T: FromStr>(value: &str, name: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| StockError::CommandError(format!("'{value}' is not a valid {name}")))
}

fn indicator(kind: IndicatorKind, args: &[&str]) -> Result<IndicatorCommand> {
    let first = arg(args, "indicator command")?;
    let change = match first.to_lowercase().as_str() {
        "on" | "enable" => IndicatorChange::Enable(true),
        "off" | "disable" => IndicatorChange::Enable(false),
        _ => match kind {
            IndicatorKind::Sma | IndicatorKind::Ema | IndicatorKind::Rsi => {
                IndicatorChange::Window(number(first, "window")?)
            }
            IndicatorKind::Macd => {
                let [fast, slow, signal] = args else {
                    return Err(StockError::CommandError(
                        "usage: macd <fast> <slow> <signal>".to_string(),
                    ));
                };
                IndicatorChange::Macd {
                    fast: number(fast, "fast period")?,
                    slow: number(slow, "slow period")?,
                    signal: number(signal, "signal period")?,
                }
            }
            IndicatorKind::Bollinger => IndicatorChange::Bollinger {
                window: number(first, "window")?,
                std_dev: args
                    .get(1)
                    .map(|k| number(k, "standard deviation multiplier"))
                    .transpose()?,
            },
        },
    };
    Ok(IndicatorCommand { kind, change })
}

impl Command {
    /// Parse one line; a leading `/` is optional except for single-letter aliases
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(StockError::CommandError("Empty input".to_string()));
        }

        let body = input.strip_prefix('/').unwrap_or(input);
        let (cmd, rest) = body
            .split_once(char::is_whitespace)
            .map_or((body, ""), |(c, r)| (c, r.trim()));
        let args: Vec<&str> = rest.split_whitespace().collect();
        let cmd = cmd.to_lowercase();

        // "a good buy?" is a question, "/a good" is a command
        if !input.starts_with('/') && matches!(cmd.as_str(), "a" | "p" | "h" | "q") {
            return Ok(Command::Query(input.to_string()));
        }

        match cmd.as_str() {
            "analyze" | "a" => {
                let ticker = arg(&args, "analyze")?;
                let period = args.get(1).map(|p| p.parse()).transpose()?;
                Ok(Command::Analyze {
                    ticker: ticker.to_string(),
                    period,
                })
            }
            "period" | "p" => Ok(Command::Period(arg(&args, "period")?.parse()?)),
            "key" => match args.as_slice() {
                ["clear"] => Ok(Command::ClearKeys),
                [target, key] => {
                    let target = match target.to_lowercase().as_str() {
                        "ai" | "gemini" => KeyTarget::Ai,
                        "search" | "serp" | "serpapi" => KeyTarget::Search,
                        other => {
                            return Err(StockError::CommandError(format!(
                                "unknown key target '{other}' (expected ai or search)"
                            )));
                        }
                    };
                    Ok(Command::SetKey {
                        target,
                        key: (*key).to_string(),
                    })
                }
                _ => Err(StockError::CommandError(
                    "usage: key ai|search <KEY>, or key clear".to_string(),
                )),
            },
            "sma" => Ok(Command::Indicator(indicator(IndicatorKind::Sma, &args)?)),
            "ema" => Ok(Command::Indicator(indicator(IndicatorKind::Ema, &args)?)),
            "rsi" => Ok(Command::Indicator(indicator(IndicatorKind::Rsi, &args)?)),
            "macd" => Ok(Command::Indicator(indicator(IndicatorKind::Macd, &args)?)),
            "bb" | "bollinger" => Ok(Command::Indicator(indicator(
                IndicatorKind::Bollinger,
                &args,
            )?)),
            "indicators" | "ind" => Ok(Command::Indicators),
            "show" | "tab" => Ok(Command::Show(arg(&args, "show")?.parse()?)),
            "ask" => {
                if rest.is_empty() {
                    return Err(StockError::CommandError("Missing question".to_string()));
                }
                Ok(Command::Ask(rest.to_string()))
            }
            "reset" => Ok(Command::Reset),
            "help" | "h" | "?" => Ok(Command::Help),
            "exit" | "quit" | "q" => Ok(Command::Exit),
            _ if input.starts_with('/') => {
                Err(StockError::CommandError(format!("Unknown command: {cmd}")))
            }
            _ => Ok(Command::Query(input.to_string())),
        }
    }

    pub fn help_text() -> &'static str {
        r"
Commands
========

  analyze <TICKER> [PERIOD]    fetch data and run the analysis
  period <PERIOD>              1M, 3M, 6M, YTD, 1Y, 2Y, 5Y or All
  key ai <KEY>                 Gemini API key for the AI analysis
  key search <KEY>             SerpAPI key for external news
  key clear                    forget both keys
  show <TAB>                   overview, price, financials, company, ai

Indicators:
  sma|ema|rsi on|off           toggle an indicator
  sma|ema|rsi <WINDOW>         set the window
  macd <FAST> <SLOW> <SIGNAL>  set MACD periods (macd on|off to toggle)
  bb <WINDOW> [STD]            set Bollinger window and multiplier (bb on|off)
  indicators                   show current settings

Chat:
  ask <QUESTION>               follow-up question about the analysis
  <QUESTION>                   same as ask, once an analysis is ready

Other:
  reset                        clear the session
  help                         show this help
  exit                         quit

A leading / is optional: /analyze AAPL works too.
The short forms /a /p /h /q need the slash.
"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        assert_eq!(
            Command::parse("analyze aapl 1y").unwrap(),
            Command::Analyze {
                ticker: "aapl".to_string(),
                period: Some(Period::OneYear),
            }
        );
        assert_eq!(
            Command::parse("/a MSFT").unwrap(),
            Command::Analyze {
                ticker: "MSFT".to_string(),
                period: None,
            }
        );
        assert!(Command::parse("analyze").is_err());
        assert!(Command::parse("analyze AAPL 10y").is_err());
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(
            Command::parse("key ai abc123").unwrap(),
            Command::SetKey {
                target: KeyTarget::Ai,
                key: "abc123".to_string(),
            }
        );
        assert_eq!(Command::parse("key clear").unwrap(), Command::ClearKeys);
        assert!(Command::parse("key other x").is_err());
        assert!(Command::parse("key ai").is_err());
    }

    #[test]
    fn test_parse_indicators() {
        let Command::Indicator(cmd) = Command::parse("ema 30").unwrap() else {
            panic!("expected indicator command");
        };
        let config = cmd.apply(IndicatorConfig::default());
        assert!(config.ema.enabled);
        assert_eq!(config.ema.window, 30);

        let Command::Indicator(cmd) = Command::parse("macd 8 21 5").unwrap() else {
            panic!("expected indicator command");
        };
        let config = cmd.apply(IndicatorConfig::default());
        assert_eq!((config.macd.fast, config.macd.slow, config.macd.signal), (8, 21, 5));

        let Command::Indicator(cmd) = Command::parse("bb off").unwrap() else {
            panic!("expected indicator command");
        };
        assert!(!cmd.apply(IndicatorConfig::default()).bollinger.enabled);

        let Command::Indicator(cmd) = Command::parse("bb 25 2.5").unwrap() else {
            panic!("expected indicator command");
        };
        let config = cmd.apply(IndicatorConfig::default());
        assert_eq!(config.bollinger.window, 25);
        assert!((config.bollinger.std_dev - 2.5).abs() < f64::EPSILON);

        assert!(Command::parse("macd 8 21").is_err());
        assert!(Command::parse("rsi fast").is_err());
    }

    #[test]
    fn test_parse_text_and_ask() {
        assert_eq!(
            Command::parse("what about margins?").unwrap(),
            Command::Query("what about margins?".to_string())
        );
        assert_eq!(
            Command::parse("ask  How is debt trending? ").unwrap(),
            Command::Ask("How is debt trending?".to_string())
        );
        assert!(Command::parse("/frobnicate").is_err());
        assert!(Command::parse("   ").is_err());
    }

    #[test]
    fn test_short_aliases_need_slash() {
        assert_eq!(
            Command::parse("a good buy?").unwrap(),
            Command::Query("a good buy?".to_string())
        );
        assert_eq!(
            Command::parse("p/e looks high?").unwrap(),
            Command::Query("p/e looks high?".to_string())
        );
        assert_eq!(Command::parse("q").unwrap(), Command::Query("q".to_string()));
        assert_eq!(Command::parse("/q").unwrap(), Command::Exit);
        assert_eq!(Command::parse("/h").unwrap(), Command::Help);
        assert_eq!(
            Command::parse("/p 5y").unwrap(),
            Command::Period(Period::FiveYears)
        );
        assert_eq!(
            Command::parse("/a aapl").unwrap(),
            Command::Analyze {
                ticker: "aapl".to_string(),
                period: None,
            }
        );
    }

    #[test]
    fn test_parse_show() {
        assert_eq!(
            Command::parse("show financials").unwrap(),
            Command::Show(Tab::Financials)
        );
        assert_eq!(Command::parse("quit").unwrap(), Command::Exit);
    }
}

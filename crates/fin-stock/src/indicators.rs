//! Technical indicators over a snapshot's price history
//!
//! Every series is aligned index-for-index with the candles. Values the
//! indicator cannot define yet (the warm-up of its window) are `None`.

use crate::error::{Result, StockError};
use crate::market::Candle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use ta::Next;
use ta::indicators::{
    BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex, SimpleMovingAverage,
};

/// Aligned indicator values, `None` during warm-up
pub type Series = Vec<Option<f64>>;

/// On/off switch plus a single lookback window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub enabled: bool,
    pub window: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdConfig {
    pub enabled: bool,
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerConfig {
    pub enabled: bool,
    pub window: usize,
    pub std_dev: f64,
}

/// Parameters for every indicator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub sma: WindowConfig,
    pub ema: WindowConfig,
    pub rsi: WindowConfig,
    pub macd: MacdConfig,
    pub bollinger: BollingerConfig,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma: WindowConfig {
                enabled: true,
                window: 20,
            },
            ema: WindowConfig {
                enabled: false,
                window: 50,
            },
            rsi: WindowConfig {
                enabled: true,
                window: 14,
            },
            macd: MacdConfig {
                enabled: true,
                fast: 12,
                slow: 26,
                signal: 9,
            },
            bollinger: BollingerConfig {
                enabled: true,
                window: 20,
                std_dev: 2.0,
            },
        }
    }
}

pub const SMA_WINDOW: RangeInclusive<usize> = 5..=100;
pub const EMA_WINDOW: RangeInclusive<usize> = 5..=100;
pub const RSI_WINDOW: RangeInclusive<usize> = 7..=30;
pub const MACD_FAST: RangeInclusive<usize> = 5..=50;
pub const MACD_SLOW: RangeInclusive<usize> = 10..=100;
pub const MACD_SIGNAL: RangeInclusive<usize> = 5..=50;
pub const BB_WINDOW: RangeInclusive<usize> = 5..=50;
pub const BB_STD_DEV: RangeInclusive<f64> = 1.0..=3.0;

fn check_range<T: PartialOrd + fmt::Display>(
    name: &str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(StockError::InvalidInput(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

impl IndicatorConfig {
    /// Reject out-of-range parameters, enabled or not
    pub fn validate(&self) -> Result<()> {
        check_range("SMA window", self.sma.window, &SMA_WINDOW)?;
        check_range("EMA window", self.ema.window, &EMA_WINDOW)?;
        check_range("RSI window", self.rsi.window, &RSI_WINDOW)?;
        check_range("MACD fast period", self.macd.fast, &MACD_FAST)?;
        check_range("MACD slow period", self.macd.slow, &MACD_SLOW)?;
        check_range("MACD signal period", self.macd.signal, &MACD_SIGNAL)?;
        if self.macd.fast >= self.macd.slow {
            return Err(StockError::InvalidInput(format!(
                "MACD fast period ({}) must be less than slow period ({})",
                self.macd.fast, self.macd.slow
            )));
        }
        check_range("Bollinger window", self.bollinger.window, &BB_WINDOW)?;
        check_range("Bollinger std-dev", self.bollinger.std_dev, &BB_STD_DEV)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerSeries {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

/// Indicator series for the enabled indicators; disabled ones are `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub sma: Option<Series>,
    pub ema: Option<Series>,
    pub rsi: Option<Series>,
    pub macd: Option<MacdSeries>,
    pub bollinger: Option<BollingerSeries>,
}

/// RSI reading bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiSignal {
    Overbought,
    Oversold,
    Neutral,
}

impl fmt::Display for RsiSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RsiSignal::Overbought => "overbought",
            RsiSignal::Oversold => "oversold",
            RsiSignal::Neutral => "neutral",
        })
    }
}

/// Above 70 is overbought, below 30 oversold
pub fn interpret_rsi(rsi: f64) -> RsiSignal {
    if rsi > 70.0 {
        RsiSignal::Overbought
    } else if rsi < 30.0 {
        RsiSignal::Oversold
    } else {
        RsiSignal::Neutral
    }
}

fn indicator_err(e: impl fmt::Display) -> StockError {
    StockError::IndicatorError(e.to_string())
}

/// Mask the first `warmup` values
fn aligned(values: impl IntoIterator<Item = f64>, warmup: usize) -> Series {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i >= warmup && v.is_finite()).then_some(v))
        .collect()
}

fn run<I: Next<f64, Output = f64>>(mut indicator: I, closes: &[f64], warmup: usize) -> Series {
    aligned(closes.iter().map(|&c| indicator.next(c)), warmup)
}

/// Compute every enabled indicator over the candles' closes
///
/// Pure: the result depends only on `candles` and `config`.
pub fn compute(candles: &[Candle], config: &IndicatorConfig) -> Result<IndicatorSet> {
    config.validate()?;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let mut set = IndicatorSet::default();

    if config.sma.enabled {
        let w = config.sma.window;
        set.sma = Some(run(
            SimpleMovingAverage::new(w).map_err(indicator_err)?,
            &closes,
            w - 1,
        ));
    }

    if config.ema.enabled {
        let w = config.ema.window;
        set.ema = Some(run(
            ExponentialMovingAverage::new(w).map_err(indicator_err)?,
            &closes,
            w - 1,
        ));
    }

    if config.rsi.enabled {
        let w = config.rsi.window;
        set.rsi = Some(run(
            RelativeStrengthIndex::new(w).map_err(indicator_err)?,
            &closes,
            w,
        ));
    }

    if config.macd.enabled {
        let MacdConfig {
            fast, slow, signal, ..
        } = config.macd;
        let mut macd =
            MovingAverageConvergenceDivergence::new(fast, slow, signal).map_err(indicator_err)?;
        let outputs: Vec<_> = closes.iter().map(|&c| macd.next(c)).collect();
        let line_warmup = slow - 1;
        let signal_warmup = slow + signal - 2;

        set.macd = Some(MacdSeries {
            macd: aligned(outputs.iter().map(|o| o.macd), line_warmup),
            signal: aligned(outputs.iter().map(|o| o.signal), signal_warmup),
            histogram: aligned(outputs.iter().map(|o| o.histogram), signal_warmup),
        });
    }

    if config.bollinger.enabled {
        let w = config.bollinger.window;
        let mut bb =
            BollingerBands::new(w, config.bollinger.std_dev).map_err(indicator_err)?;
        let outputs: Vec<_> = closes.iter().map(|&c| bb.next(c)).collect();

        set.bollinger = Some(BollingerSeries {
            upper: aligned(outputs.iter().map(|o| o.upper), w - 1),
            middle: aligned(outputs.iter().map(|o| o.average), w - 1),
            lower: aligned(outputs.iter().map(|o| o.lower), w - 1),
        });
    }

    Ok(set)
}

fn last_defined(series: &Series) -> Option<f64> {
    series.iter().rev().find_map(|v| *v)
}

impl IndicatorSet {
    pub fn latest_rsi(&self) -> Option<f64> {
        self.rsi.as_ref().and_then(last_defined)
    }

    /// Latest value of each enabled indicator as (label, reading) pairs
    pub fn latest_readings(&self, config: &IndicatorConfig) -> Vec<(String, String)> {
        let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
        let mut out = Vec::new();

        if let Some(s) = &self.sma {
            out.push((format!("SMA({})", config.sma.window), fmt(last_defined(s))));
        }
        if let Some(s) = &self.ema {
            out.push((format!("EMA({})", config.ema.window), fmt(last_defined(s))));
        }
        if let Some(s) = &self.rsi {
            let reading = match last_defined(s) {
                Some(v) => format!("{v:.2} ({})", interpret_rsi(v)),
                None => "n/a".to_string(),
            };
            out.push((format!("RSI({})", config.rsi.window), reading));
        }
        if let Some(m) = &self.macd {
            out.push((
                format!(
                    "MACD({},{},{})",
                    config.macd.fast, config.macd.slow, config.macd.signal
                ),
                format!(
                    "line {} / signal {} / histogram {}",
                    fmt(last_defined(&m.macd)),
                    fmt(last_defined(&m.signal)),
                    fmt(last_defined(&m.histogram))
                ),
            ));
        }
        if let Some(b) = &self.bollinger {
            out.push((
                format!(
                    "Bollinger({}, {:.1}σ)",
                    config.bollinger.window, config.bollinger.std_dev
                ),
                format!(
                    "upper {} / middle {} / lower {}",
                    fmt(last_defined(&b.upper)),
                    fmt(last_defined(&b.middle)),
                    fmt(last_defined(&b.lower))
                ),
            ));
        }
        out
    }
}

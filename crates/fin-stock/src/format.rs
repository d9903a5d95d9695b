//! Number formatting shared by the prompt builder and the dashboard

pub const NOT_AVAILABLE: &str = "N/A";

/// `12.34`, or N/A
pub fn decimal(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite())
        .map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.2}"))
}

/// Compact magnitude: `3.01T`, `383.29B`, `12.50M`, `950.00`
pub fn large_number(value: Option<f64>) -> String {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return NOT_AVAILABLE.to_string();
    };
    let abs = v.abs();
    if abs >= 1e12 {
        format!("{:.2}T", v / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", v / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", v / 1e6)
    } else {
        format!("{v:.2}")
    }
}

/// Market capitalization in trillions; N/A unless positive
pub fn market_cap(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.2}T", v / 1e12))
}

/// A ratio (0.25) shown as a percentage (25.00%)
pub fn ratio_percent(value: Option<f64>) -> String {
    value
        .filter(|v| v.is_finite())
        .map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.2}%", v * 100.0))
}

/// Dividend yield; providers report it either as a ratio or already in percent
pub fn dividend_yield(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite() && *v >= 0.0) {
        Some(v) if v >= 1.0 => format!("{v:.2}%"),
        Some(v) => format!("{:.2}%", v * 100.0),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Normalize a change percentage that may be a ratio (0.012) or a percent (1.2)
pub fn normalize_change_percent(raw: f64) -> f64 {
    if raw != 0.0 && raw.abs() < 1.0 {
        raw * 100.0
    } else {
        raw
    }
}

/// Price move shown next to the current price, e.g. `+1.23 (0.65%)`
///
/// The percentage is computed from the previous close when known, then from
/// the close inferred from `current - change`, then from the provider's own
/// percentage. With no absolute change only the percentage is shown.
pub fn price_delta(
    current: Option<f64>,
    change: Option<f64>,
    previous_close: Option<f64>,
    raw_percent: Option<f64>,
) -> Option<String> {
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    let (current, change, previous_close, raw_percent) = (
        finite(current),
        finite(change),
        finite(previous_close),
        finite(raw_percent),
    );

    let Some(change) = change else {
        return raw_percent.map(|p| format!("({:.2}%)", normalize_change_percent(p)));
    };

    let inferred = current
        .filter(|c| (*c - change).abs() > f64::EPSILON)
        .map(|c| c - change);

    let pct = previous_close
        .filter(|p| *p != 0.0)
        .or(inferred)
        .filter(|p| *p != 0.0)
        .map(|base| change / base * 100.0)
        .or_else(|| raw_percent.map(normalize_change_percent))
        .unwrap_or(0.0);

    Some(format!("{change:+.2} ({pct:.2}%)"))
}

/// Whether a ratio's label implies percentage display
pub fn is_percent_label(label: &str) -> bool {
    ["Margin", "ROE", "ROA", "Yield", "Payout"]
        .iter()
        .any(|k| label.contains(k))
}

/// Truncate to `max_chars` characters, appending an ellipsis when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

//! Text rendering of dashboard tabs

use crate::chat::ChatRole;
use crate::dashboard::{
    ChatPanel, CompanyTab, Dashboard, FinancialsTab, NewsLine, OverviewTab, PriceTab, Tab,
};
use crate::indicators::IndicatorConfig;
use crate::session::{Notice, NoticeLevel};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::fmt::Write;

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn pairs_table(header: [&str; 2], rows: &[(String, String)]) -> Table {
    let mut t = table();
    t.set_header(header.to_vec());
    for (k, v) in rows {
        t.add_row(vec![k.as_str(), v.as_str()]);
    }
    t
}

fn delta_cell(delta: &str) -> Cell {
    let color = if delta.starts_with('-') || delta.starts_with("(-") {
        Color::Red
    } else {
        Color::Green
    };
    Cell::new(delta).fg(color)
}

pub fn notices(notices: &[Notice]) -> String {
    let mut out = String::new();
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        let _ = writeln!(out, "{tag}: {notice}");
    }
    out
}

pub fn tab(dashboard: &Dashboard, tab: Tab) -> String {
    let body = match tab {
        Tab::Overview => overview(&dashboard.overview),
        Tab::PriceAnalysis => price(&dashboard.price),
        Tab::Financials => financials(&dashboard.financials),
        Tab::Company => company(&dashboard.company_tab),
        Tab::AiChat => chat(&dashboard.chat),
    };
    let tabs: Vec<String> = Tab::ALL
        .iter()
        .map(|t| {
            if *t == tab {
                format!("[{t}]")
            } else {
                t.to_string()
            }
        })
        .collect();
    format!("{}\n{}\n\n{body}", dashboard.header(), tabs.join(" | "))
}

fn overview(o: &OverviewTab) -> String {
    let mut t = table();
    t.set_header(vec!["Metric", "Value", "Change"]);
    for m in &o.metrics {
        t.add_row(vec![
            Cell::new(&m.label),
            Cell::new(&m.value),
            m.delta.as_deref().map_or_else(|| Cell::new(""), delta_cell),
        ]);
    }

    let mut out = t.to_string();
    let _ = write!(
        out,
        "\n\nPeriod {}: {} to {}, change {}, high {}, low {}",
        o.period, o.range.0, o.range.1, o.period_change, o.period_high, o.period_low
    );
    if !o.warnings.is_empty() {
        out.push_str("\n\nData notes:");
        for w in &o.warnings {
            let _ = write!(out, "\n  - {w}");
        }
    }
    out
}

fn price(p: &PriceTab) -> String {
    let mut t = table();
    t.set_header(p.columns.clone());
    for row in &p.rows {
        t.add_row(row.clone());
    }

    let mut out = format!(
        "Latest {} of {} bars\n{t}",
        p.rows.len(),
        p.bars
    );
    if !p.readings.is_empty() {
        let _ = write!(
            out,
            "\n\nIndicators (latest)\n{}",
            pairs_table(["Indicator", "Reading"], &p.readings)
        );
    }
    if let Some(signal) = &p.rsi_signal {
        let _ = write!(out, "\n{signal}");
    }
    out
}

fn financials(f: &FinancialsTab) -> String {
    let mut out = String::new();
    if f.statements.is_empty() {
        out.push_str("No financial statements available.\n");
    }
    for statement in &f.statements {
        let mut t = table();
        let mut header = vec![String::new()];
        header.extend(statement.columns.iter().cloned());
        t.set_header(header);
        for (item, values) in &statement.rows {
            let mut row = vec![item.clone()];
            row.extend(values.iter().cloned());
            t.add_row(row);
        }
        let _ = writeln!(out, "{} (annual)\n{t}\n", statement.title);
    }

    let _ = writeln!(out, "Free cash flow (latest): {}\n", f.free_cash_flow);
    let _ = writeln!(
        out,
        "Key ratios\n{}\n",
        pairs_table(["Ratio", "Value"], &f.ratios)
    );

    if f.dividends.is_empty() {
        out.push_str("No recent dividends.");
    } else {
        let _ = write!(
            out,
            "Recent dividends\n{}\nAnnual dividend: {}  Payout ratio: {}",
            pairs_table(["Date", "Amount"], &f.dividends),
            f.dividend_rate,
            f.payout_ratio
        );
    }
    out
}

fn news_table(title: &str, items: &[NewsLine]) -> String {
    let mut t = table();
    t.set_header(vec!["Title", "Publisher", "Published"]);
    for item in items {
        t.add_row(vec![&item.title, &item.publisher, &item.published]);
    }
    format!("{title}\n{t}")
}

fn company(c: &CompanyTab) -> String {
    let mut out = format!(
        "{}\n\n{}",
        c.summary,
        pairs_table(["Profile", ""], &c.profile)
    );

    if !c.major_holders.is_empty() {
        let _ = write!(
            out,
            "\n\nMajor holders\n{}",
            pairs_table(["Holder", "Value"], &c.major_holders)
        );
    }
    if !c.institutional.is_empty() {
        let mut t = table();
        t.set_header(vec!["Institution", "Shares", "% Held", "Reported"]);
        for row in &c.institutional {
            t.add_row(row.clone());
        }
        let _ = write!(out, "\n\nInstitutional holders\n{t}");
    }

    if c.recommendations.is_empty() {
        out.push_str("\n\nNo analyst recommendations.");
    } else {
        let mut t = table();
        t.set_header(vec!["Rating", "Analysts"]);
        for (label, n) in &c.recommendations {
            t.add_row(vec![label.clone(), n.to_string()]);
        }
        let _ = write!(out, "\n\nAnalyst recommendations (current)\n{t}");
    }

    if c.provider_news.is_empty() {
        out.push_str("\n\nNo provider news.");
    } else {
        let _ = write!(out, "\n\n{}", news_table("Provider news", &c.provider_news));
    }
    if !c.search_news.is_empty() {
        let _ = write!(out, "\n\n{}", news_table("External news", &c.search_news));
    }
    if let Some(note) = &c.news_note {
        let _ = write!(out, "\n{note}");
    }
    out
}

pub fn chat(panel: &ChatPanel) -> String {
    match panel {
        ChatPanel::KeyRequired(msg) | ChatPanel::Unavailable(msg) => msg.clone(),
        ChatPanel::Ready(messages) => {
            let mut out = String::new();
            for (role, text) in messages {
                let who = match role {
                    ChatRole::User => "You",
                    ChatRole::Assistant => "Gemini",
                };
                let _ = writeln!(out, "{who}:\n{text}\n");
            }
            out.trim_end().to_string()
        }
    }
}

pub fn indicator_config(config: &IndicatorConfig) -> String {
    let flag = |on: bool| if on { "on" } else { "off" };
    let rows = vec![
        (
            "SMA".to_string(),
            format!("{} (window {})", flag(config.sma.enabled), config.sma.window),
        ),
        (
            "EMA".to_string(),
            format!("{} (window {})", flag(config.ema.enabled), config.ema.window),
        ),
        (
            "RSI".to_string(),
            format!("{} (window {})", flag(config.rsi.enabled), config.rsi.window),
        ),
        (
            "MACD".to_string(),
            format!(
                "{} ({}, {}, {})",
                flag(config.macd.enabled),
                config.macd.fast,
                config.macd.slow,
                config.macd.signal
            ),
        ),
        (
            "Bollinger".to_string(),
            format!(
                "{} (window {}, {:.1}σ)",
                flag(config.bollinger.enabled),
                config.bollinger.window,
                config.bollinger.std_dev
            ),
        ),
    ];
    pairs_table(["Indicator", "Setting"], &rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::session::Section;

    #[test]
    fn test_notices_render() {
        let out = notices(&[
            Notice::unavailable(Section::Ai, ErrorKind::AiUnavailable, "key required"),
            Notice::warning(Section::Market, "Volume data missing"),
        ]);
        assert!(out.contains("info: [AI analysis] AIUnavailable: key required"));
        assert!(out.contains("warning: [market data] Volume data missing"));
    }

    #[test]
    fn test_chat_render() {
        let panel = ChatPanel::Ready(vec![
            (ChatRole::Assistant, "Initial analysis".to_string()),
            (ChatRole::User, "Why?".to_string()),
        ]);
        let out = chat(&panel);
        assert!(out.starts_with("Gemini:\nInitial analysis"));
        assert!(out.ends_with("You:\nWhy?"));
        assert_eq!(chat(&ChatPanel::KeyRequired("need key".into())), "need key");
    }

    #[test]
    fn test_indicator_config_render() {
        let out = indicator_config(&IndicatorConfig::default());
        assert!(out.contains("SMA"));
        assert!(out.contains("on (window 20)"));
        assert!(out.contains("off (window 50)"));
    }
}

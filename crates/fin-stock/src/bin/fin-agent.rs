//! fin-agent terminal dashboard
//!
//! # Usage
//!
//! ```bash
//! export GOOGLE_API_KEY="..."    # optional, enables the AI analysis
//! export SERPAPI_API_KEY="..."   # optional, enables external news
//!
//! cargo run --bin fin-agent -- AAPL --period 1y
//! ```

use clap::Parser;
use fin_stock::bot::{BotConfig, Command, Reply, StockBot};
use fin_stock::{AnalysisPipeline, ApiKeys, Language, Period, StockConfig};
use fin_utils::{AppConfig, LogFormat, init_tracing_with};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "fin-agent", version, about = "Stock dashboard with Gemini analysis")]
struct Args {
    /// Ticker to analyze on startup
    ticker: Option<String>,

    /// Chart period: 1M, 3M, 6M, YTD, 1Y, 2Y, 5Y or All
    #[arg(short, long, default_value = "2Y")]
    period: Period,

    /// Prompt and answer language (en or zh)
    #[arg(short, long, default_value = "en")]
    language: Language,

    /// Gemini model name, overrides GEMINI_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Timeout for market-data and search calls, in seconds
    #[arg(long, default_value_t = 20)]
    data_timeout: u64,

    /// Timeout for AI calls, in seconds
    #[arg(long, default_value_t = 120)]
    ai_timeout: u64,

    /// Chat messages resent with each follow-up
    #[arg(long, default_value_t = 20)]
    chat_window: usize,

    /// Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// SerpAPI key
    #[arg(long, env = "SERPAPI_API_KEY", hide_env_values = true)]
    serpapi_api_key: Option<String>,

    /// Log output format (pretty or json)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let app = AppConfig {
        log_format: args.log_format,
        ..AppConfig::default()
    };
    init_tracing_with(&app);

    let mut builder = StockConfig::builder()
        .with_env_model()
        .default_period(args.period)
        .language(args.language)
        .request_timeout(Duration::from_secs(args.data_timeout))
        .ai_timeout(Duration::from_secs(args.ai_timeout))
        .chat_window(args.chat_window);
    if let Some(model) = args.model {
        builder = builder.model(model);
    }
    let config = builder.build()?;

    println!(
        "{}  Model: {}  Language: {}",
        app.banner(env!("CARGO_PKG_VERSION")),
        config.model,
        config.language
    );

    let pipeline = AnalysisPipeline::from_config(config)?;
    let mut bot = StockBot::new(pipeline, BotConfig::default());

    let keys = ApiKeys::new(
        args.google_api_key.as_deref(),
        args.serpapi_api_key.as_deref(),
    );
    if keys != ApiKeys::default() {
        println!("{}\n", bot.set_keys(keys).await);
    }

    if let Some(ticker) = args.ticker {
        let command = Command::Analyze {
            ticker,
            period: Some(args.period),
        };
        if let Reply::Text(text) = bot.execute(command).await {
            println!("{text}\n");
        }
    }

    bot.run_repl().await?;
    Ok(())
}

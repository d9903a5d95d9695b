//! Logging and tracing utilities

use crate::config::{AppConfig, LogFormat};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber with default configuration
pub fn init_tracing() {
    init_tracing_with(&AppConfig::default());
}

/// Initialize tracing from an [`AppConfig`]
///
/// `RUST_LOG` takes precedence over `default_log_filter`. Logs go to stderr so
/// they never interleave with the terminal dashboard on stdout.
pub fn init_tracing_with(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_filter));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    match result {
        Ok(()) => tracing::debug!(app = %config.app_name, "Tracing initialized"),
        Err(e) => eprintln!("tracing already initialized: {e}"),
    }
}

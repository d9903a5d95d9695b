//! Shared utilities for fin-agent
//!
//! Logging setup and the small application-level configuration shared by the
//! workspace crates.

pub mod config;
pub mod logging;

pub use config::{AppConfig, LogFormat};
pub use logging::{init_tracing, init_tracing_with};

//! Structured logging via the tracing crate
//!
//! Output format and level come from the environment:
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG, TRACE (default INFO)
//! - `LOG_FORMAT`: json, pretty, compact (default json)
//! - `RUST_LOG`: overrides the filter entirely (env_logger syntax)

use std::env;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Structured JSON for log aggregation.
    Json,
    /// Human-readable with colors and indentation.
    Pretty,
    /// Terminal-friendly, colors with minimal spacing.
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Initialize logging with explicit settings.
pub fn init_logging(level: Level, format: LogFormat) {
    let mut filter = EnvFilter::new(level.to_string())
        // Reduce noise from dependencies
        .add_directive("rumqttc=warn".parse().expect("static directive"))
        .add_directive("tokio=warn".parse().expect("static directive"));

    if let Ok(rust_log) = env::var("RUST_LOG") {
        filter = EnvFilter::new(rust_log);
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            subscriber.with(fmt::layer().json()).init();
        }
        LogFormat::Pretty => {
            subscriber.with(fmt::layer().pretty().with_ansi(true)).init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_ansi(true).with_target(false))
                .init();
        }
    }
}

/// Initialize logging from environment variables.
pub fn init_default_logging() {
    let level = match env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "INFO".to_string())
        .to_uppercase()
        .as_str()
    {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    };

    let format = LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()));

    init_logging(level, format);
}

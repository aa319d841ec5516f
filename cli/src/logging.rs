//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The level comes from `--log-level` (or `FP8_LAUNCH_LOG`), defaulting to `info`. Logs go to
//! STDERR so that STDOUT carries only the conversion log.

use anyhow::{anyhow, Result};
use tracing_subscriber::fmt;

use crate::arg_parser::LogLevel;

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let level = level.map(tracing_level).unwrap_or(tracing::Level::INFO);

    fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to initialise logging: {}", err))
}

fn tracing_level(level: LogLevel) -> tracing::Level {
    match level {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

//! Log output setup.
//!
//! Everything in the crate logs through the [`log`] facade. [`init`]
//! installs a [`fern`] dispatcher writing timestamped lines to stderr and,
//! if configured, to a file.

use std::fmt;

use log::LevelFilter;

use crate::config::LoggingConfig;

/// Environment variable that overrides the configured level when it holds a
/// plain level such as `debug`. Per-module directives are not supported.
pub const LEVEL_ENV: &str = "RUST_LOG";

/// Errors raised while installing the logger.
#[derive(Debug)]
pub enum LoggingError {
    File(std::io::Error),
    AlreadyInitialized(log::SetLoggerError),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::File(e) => write!(f, "failed to open log file: {}", e),
            LoggingError::AlreadyInitialized(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Picks the level filter. The environment value wins when it parses.
pub fn level_filter(configured: &str, env: Option<&str>) -> LevelFilter {
    env.and_then(|s| s.trim().parse().ok())
        .or_else(|| configured.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Installs the global logger. Fails if a logger is already set.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env = std::env::var(LEVEL_ENV).ok();
    let level = level_filter(&config.level, env.as_deref());

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {:<5} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(path) = &config.file {
        dispatch = dispatch.chain(fern::log_file(path).map_err(LoggingError::File)?);
    }

    dispatch.apply().map_err(LoggingError::AlreadyInitialized)?;
    log::debug!("logging initialized at {}", level);
    Ok(())
}

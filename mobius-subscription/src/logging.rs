//! Logging setup for applications embedding a subscription
//!
//! All status lines (registration, connection, notifications, shutdown) are
//! emitted through `tracing`. Nothing is printed unless the application installs
//! a subscriber, either its own or one from this module.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose output with thread ids and source locations
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `MOBIUS_LOG_LEVEL`: filter directive (e.g. `info`, `mobius_stream=debug`)
/// - `RUST_LOG`: used when `MOBIUS_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .compact(),
                )
                .with(create_env_filter("info"));

            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(create_env_filter("debug"));

            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `MOBIUS_LOG_MODE` (`silent`, `development`, `debug`)
///
/// Defaults to development output, since the status lines are the primary
/// feedback of a running subscription.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_logging(mode_from(std::env::var("MOBIUS_LOG_MODE").ok().as_deref()))
}

fn mode_from(value: Option<&str>) -> LoggingMode {
    match value {
        Some("silent") => LoggingMode::Silent,
        Some("debug") => LoggingMode::Debug,
        _ => LoggingMode::Development,
    }
}

fn create_env_filter(default_level: &str) -> EnvFilter {
    if let Ok(level) = std::env::var("MOBIUS_LOG_LEVEL") {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}

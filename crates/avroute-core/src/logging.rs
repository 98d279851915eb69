/*!
 * Logging functionality for avroute.
 *
 * This module provides tracing setup and span helpers so that every driver
 * call and transport stream logs with the same shape.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "avroute_devices=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    install(filter, true, true)
}

/// Initialize the logging system from the `[logging]` configuration section.
///
/// `RUST_LOG` still wins over the configured level when it is set.
pub fn init_with_config(config: &LoggingConfig) -> Result<()> {
    install(&config.level, config.show_target, config.ansi)
}

fn install(filter: &str, with_target: bool, ansi: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(with_target)
                .with_ansi(ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span for an operation
///
/// # Arguments
///
/// * `name` - The name of the operation (`activate`, `power_on`, ...)
/// * `component` - The component performing the operation, usually a driver id
pub fn operation_span(name: &str, component: &str) -> Span {
    tracing::info_span!("operation", name = %name, component = %component)
}

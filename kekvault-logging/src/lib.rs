//! Structured logging setup for KEK vault services

use kekvault_config::{KekConfig, LogFormat};
use thiserror::Error;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to install global subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// `RUST_LOG` wins over the configured level when set
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging from the service configuration
///
/// Picks JSON or console output from `log_format` and the level from `log_level`.
pub fn init_from_config(service_name: &str, config: &KekConfig) -> Result<(), LoggingError> {
    match config.log_format {
        LogFormat::Json => init_logging(service_name, config.log_level()),
        LogFormat::Console => init_console_logging(service_name, config.log_level()),
    }
}

/// Initialize JSON structured logging (for production)
pub fn init_logging(service_name: &str, default_level: &str) -> Result<(), LoggingError> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(false)
                .with_span_list(false),
        )
        .try_init()?;

    tracing::info!(service = service_name, "Logging initialized");
    Ok(())
}

/// Initialize human-readable console logging (for development and CLI use)
pub fn init_console_logging(service_name: &str, default_level: &str) -> Result<(), LoggingError> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()?;

    tracing::debug!(service = service_name, "Console logging initialized");
    Ok(())
}

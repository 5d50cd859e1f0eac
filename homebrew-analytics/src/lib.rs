//! Homebrew Analytics Library
//!
//! This crate provides the shared model for the analytics published by
//! formulae.brew.sh:
//!
//! - [`analytics`] - Analytics documents (`AnalyticsDocument`, `AnalyticsItem`) and count normalization
//! - [`source`] - Metric kinds and time windows, and the document paths they map to
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`error`] - Error types

pub mod analytics;
pub mod config;
pub mod error;
pub mod source;

// Re-export commonly used types at the crate root
pub use analytics::{AnalyticsDocument, AnalyticsItem, normalize_count};
pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, NormalizeError, ParseError, Result};
pub use source::{MetricKind, Window, document_path};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG`, when set, takes precedence over `config.level`.
///
/// # Example
///
/// ```ignore
/// use homebrew_analytics::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}

//! Logging initialization for pipeline hosts.
//!
//! Structured logging via the tracing ecosystem. Library crates only
//! emit events; binaries call [`init_logging`] (or the `_with_config`
//! variant) once at startup.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level applied to the workspace crates.
    pub level: Level,
    /// Whether to emit JSON lines instead of human-readable output.
    pub json_format: bool,
    /// Whether to emit span open/close events.
    pub include_spans: bool,
    /// Whether to include module targets.
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose human-readable output for local development.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json_format: false,
            include_spans: true,
            include_target: true,
        }
    }

    /// JSON output for log aggregation in production.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_target: true,
        }
    }
}

/// Initializes logging with the default configuration.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::default());
}

/// Initializes logging with the given configuration.
///
/// `RUST_LOG` overrides the configured level when set. Repeated calls
/// are no-ops rather than panics, so tests can call this freely.
pub fn init_logging_with_config(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cw_core={level},cw_adapters={level},cw_analyzers={level},cw_pipeline={level}",
            level = config.level
        ))
    });

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = if config.json_format {
        let layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_target(config.include_target);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
    } else {
        let layer = fmt::layer()
            .with_span_events(span_events)
            .with_target(config.include_target);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
    };

    // Already initialized (tests, embedding hosts): keep the existing
    // subscriber.
    let _ = result;
}

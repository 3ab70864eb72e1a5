//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Library code only emits events; applications embedding the pipeline call
//! [`init_logging`] once at startup to install a subscriber.
//!
//! # Log Levels
//!
//! - `error`: aborted runs
//! - `warn`: precondition violations (unsorted merge input, duplicate table keys)
//! - `info`: run and merge summaries
//! - `debug`: per-file and per-store lifecycle
//! - `trace`: row-level events; case values only with [`LogConfig::log_data`]
//!
//! # Usage
//!
//! ```no_run
//! use caseflow_core::logging::{LogConfig, init_logging};
//!
//! let config = LogConfig::from_verbosity(1);
//! init_logging(&config).unwrap();
//! ```

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self as sfmt, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

/// Placeholder logged in place of case values.
pub const REDACTED_VALUE: &str = "[REDACTED]";

const CRATES: [&str; 3] = ["caseflow_model", "caseflow_core", "caseflow_merge"];

/// Returns true if case values may be logged.
pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Relaxed)
}

/// Render `value` for a log event, or the redaction token when case values
/// must not be logged.
pub fn redact_value(value: &impl fmt::Display) -> String {
    if log_data_enabled() {
        value.to_string()
    } else {
        REDACTED_VALUE.to_string()
    }
}

/// Configuration for logging behavior.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level for the caseflow crates.
    pub level: Level,
    /// Whether to include the module path.
    pub with_target: bool,
    /// Whether JSON output reports span closes.
    pub with_spans: bool,
    /// Whether to use ANSI colors.
    pub with_ansi: bool,
    /// Output format.
    pub format: LogFormat,
    /// Whether case values may appear in log events.
    pub log_data: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field format.
    #[default]
    Pretty,
    /// Single-line format.
    Compact,
    /// JSON lines.
    Json,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            with_target: false,
            with_spans: true,
            with_ansi: true,
            format: LogFormat::default(),
            log_data: false,
        }
    }
}

impl LogConfig {
    /// Map a verbosity count to a level: 0 is info, 1 debug, 2 or more trace.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    /// Set the level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Enable or disable the module path.
    #[must_use]
    pub fn with_target(mut self, enable: bool) -> Self {
        self.with_target = enable;
        self
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Allow case values in log events.
    #[must_use]
    pub fn with_log_data(mut self, enable: bool) -> Self {
        self.log_data = enable;
        self
    }
}

/// Install the global subscriber described by `config`, writing to stderr.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> io::Result<()> {
    init_logging_with_writer(config, io::stderr)
}

/// Install the global subscriber, writing to `writer`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed; the data logging
/// setting is left unchanged in that case.
pub fn init_logging_with_writer<W>(config: &LogConfig, writer: W) -> io::Result<()>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = build_env_filter(config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => {
            let spans = if config.with_spans {
                sfmt::format::FmtSpan::CLOSE
            } else {
                sfmt::format::FmtSpan::NONE
            };
            let layer = sfmt::layer()
                .json()
                .with_writer(writer)
                .with_target(config.with_target)
                .with_span_events(spans);
            registry.with(layer).try_init()
        }
        LogFormat::Compact => {
            let layer = sfmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(config.with_target);
            registry.with(layer).try_init()
        }
        LogFormat::Pretty => {
            let layer = sfmt::layer()
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(config.with_target);
            registry.with(layer).try_init()
        }
    };
    installed.map_err(io::Error::other)?;
    LOG_DATA_ENABLED.store(config.log_data, Ordering::Release);
    Ok(())
}

/// `RUST_LOG` wins; otherwise the caseflow crates log at `level` and
/// everything else at warn.
fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str().to_lowercase();
        let directives: Vec<String> = CRATES
            .iter()
            .map(|krate| format!("{krate}={level}"))
            .collect();
        EnvFilter::new(format!("warn,{}", directives.join(",")))
    })
}

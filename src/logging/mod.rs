//! Logging infrastructure - structured tracing for activation and marshalling
//!
//! Design: `tracing` events with stable `event = ...` fields, a subscriber
//! installed at most once, and nothing in the library depending on whether
//! one is installed.

use crate::config::LoggingSection;
use crate::core::{ClsCtx, Guid, HResult, VarType};
use crate::errors::OleError;
use once_cell::sync::OnceCell;
use std::io;
use std::path::PathBuf;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub use tracing::{debug, error, info, trace, warn, Level};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    pub format: LogFormat,
    /// Daily-rolled files in this directory instead of stderr
    pub directory: Option<PathBuf>,
    /// Show span events (new/close)
    pub show_spans: bool,
    /// Extra filter directives (e.g. "olebridge::conversion=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            directory: None,
            show_spans: false,
            filter: None,
        }
    }
}

fn parse_level(text: &str) -> Option<Level> {
    match text.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // OLEBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Some(level) = std::env::var("OLEBRIDGE_LOG_LEVEL").ok().as_deref().and_then(parse_level) {
            config.level = level;
        }

        // OLEBRIDGE_LOG_FORMAT: compact, pretty, json
        if let Some(format) = std::env::var("OLEBRIDGE_LOG_FORMAT").ok().as_deref().and_then(LogFormat::parse) {
            config.format = format;
        }

        if let Ok(dir) = std::env::var("OLEBRIDGE_LOG_DIR") {
            if !dir.is_empty() {
                config.directory = Some(PathBuf::from(dir));
            }
        }

        config.show_spans = std::env::var("OLEBRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config for debugging reference-count problems
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            format: LogFormat::Pretty,
            directory: None,
            show_spans: true,
            filter: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

impl From<&LoggingSection> for LogConfig {
    fn from(section: &LoggingSection) -> Self {
        Self {
            level: parse_level(&section.level).unwrap_or(Level::INFO),
            format: LogFormat::parse(&section.format).unwrap_or(LogFormat::Compact),
            directory: (!section.directory.is_empty()).then(|| PathBuf::from(&section.directory)),
            show_spans: section.spans,
            filter: None,
        }
    }
}

/// Initialize logging from the environment
pub fn init() -> Option<WorkerGuard> {
    init_with_config(LogConfig::from_env())
}

/// Initialize logging with custom configuration
///
/// Only the first call installs a subscriber. The returned guard flushes
/// buffered output when dropped; keep it alive for the program's lifetime.
pub fn init_with_config(config: LogConfig) -> Option<WorkerGuard> {
    if LOGGER_INITIALIZED.set(()).is_err() {
        return None;
    }

    let (writer, guard) = match &config.directory {
        Some(dir) => tracing_appender::non_blocking(rolling::daily(dir, "olebridge.log")),
        None => tracing_appender::non_blocking(io::stderr()),
    };

    let filter = build_filter(&config);
    let span_events = if config.show_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let installed = match config.format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .compact()
                    .with_span_events(span_events)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .pretty()
                    .with_span_events(span_events)
                    .with_thread_ids(cfg!(debug_assertions)),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(writer).json().with_span_events(span_events))
            .try_init(),
    };

    // Someone else owns the global subscriber; our events go there instead
    installed.ok().map(|_| guard)
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::try_from_env("OLEBRIDGE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!("olebridge={}", config.level.as_str().to_lowercase()))
    });

    match &config.filter {
        Some(directives) => directives
            .split(',')
            .filter_map(|d| d.trim().parse().ok())
            .fold(base, |filter, directive| filter.add_directive(directive)),
        None => base,
    }
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Activation events
// ============================================================================

pub fn log_activation_call(class: &Guid, context: ClsCtx, host: Option<&str>, interfaces: usize) {
    debug!(
        event = "activation_call",
        class = %class,
        context = context.0,
        host = host.unwrap_or(""),
        interfaces,
        "Issuing batched activation"
    );
}

pub fn log_activation_failed(class: &Guid, hr: HResult) {
    debug!(
        event = "activation_failed",
        class = %class,
        hr = %hr,
        "Activation call failed"
    );
}

#[inline]
pub fn log_interface_result(iid: &Guid, hr: HResult, has_interface: bool) {
    trace!(
        event = "interface_result",
        iid = %iid,
        hr = %hr,
        has_interface,
        "Interface record"
    );
}

/// S_OK with a null pointer; a misbehaving server
pub fn log_null_interface(iid: &Guid) {
    warn!(
        event = "null_interface",
        iid = %iid,
        "Activation reported success without an interface"
    );
}

#[inline]
pub fn log_string_allocated(units: usize) {
    trace!(event = "string_alloc", units, "Foreign string allocated");
}

#[inline]
pub fn log_string_freed() {
    trace!(event = "string_free", "Foreign string freed");
}

// ============================================================================
// Conversion events
// ============================================================================

pub fn log_array_conversion(kind: VarType, count: u32) {
    debug!(
        event = "array_conversion",
        kind = %kind,
        count,
        "Converting array"
    );
}

#[inline]
pub fn log_element_error(index: usize, error: &OleError) {
    debug!(
        event = "element_error",
        index,
        error = %error,
        "Array element failed"
    );
}

/// Performance tracking utilities
pub mod perf {
    use std::time::Instant;
    use tracing::debug;

    /// Track operation duration (returns guard that logs on drop)
    #[must_use]
    pub fn track(operation: &'static str) -> PerformanceGuard {
        PerformanceGuard {
            operation,
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard {
        operation: &'static str,
        start: Instant,
    }

    impl Drop for PerformanceGuard {
        fn drop(&mut self) {
            debug!(
                operation = self.operation,
                duration_us = self.start.elapsed().as_micros() as u64,
                "operation completed"
            );
        }
    }
}

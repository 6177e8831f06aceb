//! Logging setup for a bot process.
//!
//! The global subscriber is built from [`LoggingConfig`]: a base level that
//! `RUST_LOG` overrides, per-target filters, a line format and an output.
//! The HTTP and websocket crates underneath the transport are capped at
//! `warn` unless a filter names them.
//!
//! Every handled event runs inside a `dispatch` span carrying the event kind
//! and conversation. With `span_events.close` set, each dispatch ends with one
//! line reporting how long it took:
//!
//! ```toml
//! [logging]
//! level = "info"
//! span_events = { close = true }
//!
//! [logging.filters]
//! quip_framework = "debug"
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

/// Transport internals that are only interesting when asked for.
const QUIET_TARGETS: [&str; 6] = [
    "hyper",
    "hyper_util",
    "reqwest",
    "rustls",
    "tungstenite",
    "tokio_tungstenite",
];

const DEFAULT_LOG_FILE: &str = "quip.log";

/// Installs the global subscriber described by `config`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Builds and installs the global `tracing` subscriber.
///
/// ```rust,ignore
/// use quip_runtime::LoggingBuilder;
/// use tracing::Level;
///
/// LoggingBuilder::new()
///     .level(Level::DEBUG)
///     .directive("quip_transport=trace")
///     .dispatch_timings(true)
///     .init();
/// ```
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    span_events: SpanEventConfig,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact lines on stdout at `info`.
    pub fn new() -> Self {
        Self {
            level: Level::INFO,
            directives: Vec::new(),
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
        }
    }

    /// Mirrors the `[logging]` section.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut directives: Vec<String> = config
            .filters
            .iter()
            .map(|(target, level)| format!("{target}={level}"))
            .collect();
        // HashMap order is arbitrary; keep the filter deterministic.
        directives.sort();

        Self {
            level: config.level.to_tracing_level(),
            directives,
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            span_events: config.span_events,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    /// Sets the base level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Adds an `EnvFilter` directive such as `quip_framework=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Logs the duration of every `dispatch` span when it closes.
    pub fn dispatch_timings(mut self, enabled: bool) -> Self {
        self.span_events.close = enabled;
        self
    }

    /// Sets which span lifecycle events are logged.
    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.span_events = events;
        self
    }

    /// Sets the line format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the output.
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Writes to `path` instead of a standard stream.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = LogOutput::File;
        self.file_path = Some(path.into());
        self
    }

    /// Includes thread ids in each line.
    pub fn thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Includes the source file and line in each line.
    pub fn file_location(mut self, enabled: bool) -> Self {
        self.file_location = enabled;
        self
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber; fails if one is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        tracing_subscriber::registry()
            .with(self.fmt_layer())
            .with(self.env_filter())
            .try_init()
    }

    /// Directives added on top of the base level: the quieted transport
    /// targets not named explicitly, then the explicit ones.
    fn directives(&self) -> Vec<String> {
        let named = |target: &str| {
            let nested = format!("{target}::");
            self.directives.iter().any(|d| {
                d.split('=')
                    .next()
                    .is_some_and(|t| t == target || t.starts_with(&nested))
            })
        };

        QUIET_TARGETS
            .into_iter()
            .filter(|target| !named(target))
            .map(|target| format!("{target}=warn"))
            .chain(self.directives.iter().cloned())
            .collect()
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG replaces the whole configured filter.
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }

        let base = self.level.to_string().to_lowercase();
        self.directives()
            .iter()
            .filter_map(|d| d.parse::<Directive>().ok())
            .fold(EnvFilter::new(base), EnvFilter::add_directive)
    }

    fn writer(&self) -> BoxMakeWriter {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let dir = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or(Path::new("."));
                let name = path.file_name().unwrap_or(OsStr::new(DEFAULT_LOG_FILE));
                BoxMakeWriter::new(tracing_appender::rolling::never(dir, name))
            }
            // Rejected by validation; only reachable through the builder.
            (LogOutput::File, None) => BoxMakeWriter::new(std::io::stderr),
        }
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_writer(self.writer())
            .with_span_events(fmt_span(&self.span_events))
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

fn fmt_span(events: &SpanEventConfig) -> FmtSpan {
    [
        (events.new, FmtSpan::NEW),
        (events.enter, FmtSpan::ENTER),
        (events.exit, FmtSpan::EXIT),
        (events.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(enabled, _)| *enabled)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_from_config() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            filters: HashMap::from([
                ("quip_framework".to_string(), LogLevel::Trace),
                ("quip_core".to_string(), LogLevel::Warn),
            ]),
            span_events: SpanEventConfig {
                close: true,
                ..Default::default()
            },
            file_location: true,
            ..Default::default()
        };
        let builder = LoggingBuilder::from_config(&config);

        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(
            builder.directives,
            ["quip_core=warn", "quip_framework=trace"]
        );
        assert!(builder.file_location);
        assert_eq!(fmt_span(&builder.span_events), FmtSpan::CLOSE);
    }

    #[test]
    fn test_transport_targets_are_quieted() {
        let directives = LoggingBuilder::new().directives();

        assert!(directives.contains(&"reqwest=warn".to_string()));
        assert!(directives.contains(&"tungstenite=warn".to_string()));
    }

    #[test]
    fn test_explicit_filter_wins_over_quieting() {
        let directives = LoggingBuilder::new()
            .directive("reqwest=debug")
            .directive("hyper::proto=trace")
            .directives();

        assert!(directives.contains(&"reqwest=debug".to_string()));
        assert!(!directives.contains(&"reqwest=warn".to_string()));
        assert!(!directives.contains(&"hyper=warn".to_string()));
        assert!(directives.contains(&"rustls=warn".to_string()));
    }

    #[test]
    fn test_dispatch_timings() {
        let builder = LoggingBuilder::new().dispatch_timings(true);
        assert_eq!(fmt_span(&builder.span_events), FmtSpan::CLOSE);

        let builder = builder.dispatch_timings(false);
        assert_eq!(fmt_span(&builder.span_events), FmtSpan::NONE);
    }

    #[test]
    fn test_init_is_idempotent() {
        let _ = LoggingBuilder::new().output(LogOutput::Stderr).try_init();
        assert!(LoggingBuilder::new().try_init().is_err());
        init_from_config(&LoggingConfig::default());
    }
}

//! Configuration schema definitions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use quip_core::{DirectoryOptions, RefreshPolicy};
use quip_framework::{DEFAULT_IGNORED_SUBTYPES, LetterEmojis};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
///
/// ```toml
/// [bot]
/// token = "xoxb-..."
/// app_token = "xapp-..."
///
/// [directory]
/// ttl_secs = 300
///
/// [logging]
/// level = "debug"
/// filters = { quip_core = "trace" }
///
/// [letters]
/// a = ["a", "arrow_up_small"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuipConfig {
    /// Credentials and event filtering.
    #[serde(default)]
    pub bot: BotConfig,

    /// Workspace directory caching.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Action execution.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Letter-to-emoji map for spelled reactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letters: Option<BTreeMap<String, LetterEmojis>>,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot credentials and event filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token used for Web API calls.
    #[serde(default)]
    pub token: String,

    /// App-level token used to open the socket-mode stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_token: Option<String>,

    /// Message subtypes that are never dispatched.
    #[serde(default = "default_ignored_subtypes")]
    pub ignored_subtypes: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            app_token: None,
            ignored_subtypes: default_ignored_subtypes(),
        }
    }
}

fn default_ignored_subtypes() -> Vec<String> {
    DEFAULT_IGNORED_SUBTYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// =============================================================================
// Directory and dispatch
// =============================================================================

/// Caching of channels, direct conversations and users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Seconds a fetched listing stays fresh.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Answer from an expired listing while it refreshes in the background.
    #[serde(default)]
    pub serve_stale: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            serve_stale: false,
        }
    }
}

impl DirectoryConfig {
    /// Converts to the directory's cache settings.
    pub fn to_options(&self) -> DirectoryOptions {
        DirectoryOptions {
            ttl: Duration::from_secs(self.ttl_secs),
            policy: if self.serve_stale {
                RefreshPolicy::ServeStale
            } else {
                RefreshPolicy::AwaitFresh
            },
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

/// Action execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Pause between two reactions added by one action, in milliseconds.
    #[serde(default = "default_reaction_delay_ms")]
    pub reaction_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            reaction_delay_ms: default_reaction_delay_ms(),
        }
    }
}

impl DispatchConfig {
    /// The reaction delay as a duration.
    pub fn reaction_delay(&self) -> Duration {
        Duration::from_millis(self.reaction_delay_ms)
    }
}

fn default_reaction_delay_ms() -> u64 {
    50
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every step evaluation.
    Trace,
    /// Matched handlers and executed actions.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Isolated failures.
    Warn,
    /// Fatal failures only.
    Error,
}

impl LogLevel {
    /// Returns the level name as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated.
    #[default]
    Compact,
    /// Single-line with all fields.
    Full,
    /// Multi-line, for development.
    Pretty,
    /// Newline-delimited JSON.
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// The file at `file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    /// Span created.
    #[serde(default)]
    pub new: bool,
    /// Span entered.
    #[serde(default)]
    pub enter: bool,
    /// Span exited.
    #[serde(default)]
    pub exit: bool,
    /// Span closed.
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `quip_core = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    /// Span lifecycle events.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,
}

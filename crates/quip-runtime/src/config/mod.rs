//! Configuration for the Quip runtime.
//!
//! Layered loading through figment, a serde schema with defaults for every
//! section, and validation of the values the runtime cannot start without.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, DirectoryConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    QuipConfig, SpanEventConfig,
};
pub use validation::validate_config;

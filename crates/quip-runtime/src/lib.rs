//! Quip Runtime - configuration, logging and the event loop.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `QuipConfig`) with validation
//! - Logging setup (`LoggingBuilder`), with transport internals quieted and
//!   optional per-dispatch timings
//! - The event loop (`BotRuntime`): opens the session, primes the workspace
//!   directory, then filters and dispatches every inbound event on its own task
//!
//! # Transport Features
//!
//! - `http-client`: build the Web API client from `bot.token`
//! - `ws-client`: build the socket-mode stream from `bot.app_token`
//!
//! Without them, supply collaborators through [`RuntimeBuilder::api`] and
//! [`RuntimeBuilder::event_source`].
//!
//! ```ignore
//! use quip_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = BotRuntime::builder().build()?;
//!     runtime.register_primary(directed_at_bot().contains(["hi"]), || async { "hi there" });
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, QuipConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, init_from_config};
pub use runtime::{BotRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the commonly used logging macros alongside the runtime types.
pub mod prelude {
    pub use super::{BotRuntime, QuipConfig, RuntimeError};
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

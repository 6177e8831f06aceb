//! # Quip
//!
//! A rule-based chat bot framework for Rust.
//!
//! ## Overview
//!
//! A bot is a list of rules. Each rule pairs a [`Matcher`](framework::Matcher),
//! an immutable chain of predicate and extraction steps, with an async
//! handler whose return value becomes outbound actions: replies, threaded
//! replies, ephemeral notes and emoji reactions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────────────────┐
//! │ EventSource │────▶│ EventFilter │────▶│ DispatchService              │
//! │ (socket)    │     │ (subtypes,  │     │  primary rules ─┐            │
//! └─────────────┘     │  own msgs)  │     │  fallthrough ───┼─▶ actions ─┼──▶ WebApi
//!                     └─────────────┘     │  reaction rules ┘  (in order)│
//!                                         └──────────────────────────────┘
//! ```
//!
//! - **Runtime**: opens the session, primes the workspace directory, runs the loop
//! - **Matchers**: `starts_with`, `contains`, `regex`, `and`/`or`/`not`, throttles, URLs
//! - **Handlers**: async functions taking extractors (`Text`, `Captures`, `Urls`, ...)
//! - **Actions**: executed one after another; a failure is reported to the user
//!   ephemerally and never stops the rest
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quip::prelude::*;
//!
//! async fn greet(Text(rest): Text) -> String {
//!     format!("hi there{rest}")
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = BotRuntime::builder().build()?;
//!     runtime
//!         .register_primary(directed_at_bot().starts_with(["hi"]), greet)
//!         .register_fallthrough(directed_at_bot(), || async { "¯\\_(ツ)_/¯" });
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `json-log`: JSON log output
//! - `http-client`: the HTTP Web API client
//! - `ws-client`: the socket-mode event stream

pub use quip_core as core;
pub use quip_framework as framework;
pub use quip_runtime as runtime;
pub use quip_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use quip::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use quip_runtime::{BotRuntime, QuipConfig, RuntimeError};

    // Matchers
    pub use quip_framework::{
        Matcher, ReactionPattern, UrlFilter, all, directed_at_bot, is_direct_message,
        mentions_bot,
    };

    // Extractors - for handler parameters
    pub use quip_framework::{Args, Captures, Text, Urls};

    // Responses
    pub use quip_framework::{MessageExt, MessagePayload, OutboundAction, ResponseError};

    // Inbound views and collaborators
    pub use quip_core::{
        BoundedRandomPicker, InboundMessage, KeyedThrottle, ReactionEvent, RoundRobinPicker,
        WebApi, WorkspaceDirectory,
    };
}

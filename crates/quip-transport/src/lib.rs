//! # Quip Transport
//!
//! Concrete platform collaborators for the Quip bot framework, each behind a
//! feature flag.
//!
//! ## Features
//!
//! - `http-client`: [`WebClient`](http::WebClient), a [`WebApi`](quip_core::WebApi)
//!   over the HTTP Web API
//! - `ws-client`: [`SocketModeClient`](websocket::SocketModeClient), an
//!   [`EventSource`](quip_core::EventSource) over a socket-mode connection
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  quip-runtime       │  (event loop, dispatch)
//! ├─────────────────────┤
//! │  quip-core          │  (WebApi / EventSource traits)
//! ├─────────────────────┤
//! │  quip-transport     │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (HTTP/WS)  │
//! └─────────────────────┘
//! ```
//!
//! Neither collaborator retries or reconnects: a failed call is returned to
//! the caller and a dropped socket ends the event stream.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quip_transport::{http::WebClient, websocket::SocketModeClient};
//!
//! let web = Arc::new(WebClient::new("xoxb-..."));
//! let events = SocketModeClient::new(Arc::clone(&web), "xapp-...");
//! ```

// Transport implementations (feature-gated)
#[cfg(feature = "http-client")]
pub mod http;

#[cfg(feature = "ws-client")]
pub mod websocket;

#[cfg(feature = "http-client")]
pub use http::WebClient;

#[cfg(feature = "ws-client")]
pub use websocket::SocketModeClient;

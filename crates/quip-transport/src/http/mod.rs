//! The platform's HTTP Web API.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::{DEFAULT_API_BASE, WebClient};

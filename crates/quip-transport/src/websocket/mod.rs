//! The socket-mode event stream.

#[cfg(feature = "ws-client")]
mod client;
#[cfg(feature = "ws-client")]
pub use client::SocketModeClient;

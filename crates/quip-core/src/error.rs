//! Unified error types for the Quip core.
//!
//! These are the errors raised by the two external collaborators: the
//! request/response [`WebApi`](crate::WebApi) and the event stream
//! ([`EventSource`](crate::EventSource)). Framework-level errors (handler and
//! action failures) live in `quip-framework`.

use thiserror::Error;

// =============================================================================
// API Errors
// =============================================================================

/// Errors returned by request/response API calls.
///
/// `Clone` so that a single in-flight fetch can hand the same failure to every
/// caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The platform answered with `ok: false`.
    #[error("{method} failed: {error}")]
    Platform {
        /// The API method that was called (e.g. `chat.postMessage`).
        method: String,
        /// The platform error code (e.g. `channel_not_found`).
        error: String,
    },

    /// The HTTP exchange itself failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to serialize a request or deserialize a response.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No client is connected.
    #[error("API client is not connected")]
    NotConnected,

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates a platform error for the given method.
    pub fn platform(method: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Platform {
            method: method.into(),
            error: error.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by the event stream.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// The session was used before [`start_session`](crate::EventSource::start_session).
    #[error("event stream has not been started")]
    NotStarted,

    /// An incoming frame could not be decoded.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Sending on the stream failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// An API call made while opening the session failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for event stream operations.
pub type TransportResult<T> = Result<T, TransportError>;

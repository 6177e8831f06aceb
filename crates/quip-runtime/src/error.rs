//! Runtime error types.

use quip_core::{ApiError, TransportError};
use quip_framework::LetterMapError;
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that stop the runtime from starting or keep it from running.
///
/// Failures inside a single dispatch never surface here; they are isolated
/// per handler and action.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The letter-to-emoji map is malformed.
    #[error("invalid letter map: {0}")]
    LetterMap(#[from] LetterMapError),

    /// An API call needed to start failed (e.g. priming the directory).
    #[error("startup API call failed: {0}")]
    Api(#[from] ApiError),

    /// The event stream failed.
    #[error("event stream failed: {0}")]
    Transport(#[from] TransportError),

    /// No event source or API client is available.
    #[error("{0} is not configured; enable the matching transport feature or supply one")]
    MissingCollaborator(&'static str),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

//! Error types for the Quip framework.

use std::fmt;

use quip_core::ApiError;
use thiserror::Error;

/// Returned by the event filter when an event is not dispatched.
///
/// The runtime recognises this error and skips the event without logging it
/// as a failure.
#[derive(Debug, Clone, Error)]
#[error("event skipped: {reason}")]
pub struct EventSkipped {
    /// Why the event was skipped.
    pub reason: &'static str,
}

/// Errors raised while building handler arguments.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The matcher emitted no value of the requested kind.
    #[error("the matcher extracted no {kind}")]
    Missing {
        /// The requested kind (`text`, `captures`, `urls`).
        kind: &'static str,
    },

    /// A reaction was requested outside a reaction handler.
    #[error("no reaction in a message handler")]
    NotAReaction,

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors in the letter-to-emoji map.
#[derive(Debug, Clone, Error)]
pub enum LetterMapError {
    /// A key is not exactly one character.
    #[error("key {0:?} is invalid, must be a single character")]
    InvalidKey(String),

    /// No emoji is left (or configured) for a character.
    #[error("no emoji found for `{0}`, cannot build response")]
    NoEmoji(char),
}

/// Errors raised while building or executing an outbound action.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// An API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Adding one reaction failed.
    #[error("error making reaction for `{emoji}`")]
    Reaction {
        /// The emoji that could not be added.
        emoji: String,
        /// The underlying failure.
        #[source]
        source: ApiError,
    },

    /// The primary message of a threaded reply could not be posted.
    #[error("couldn't post first message")]
    PrimaryPostFailed(#[source] ApiError),

    /// An ephemeral reply was requested for a message without a sender.
    #[error("user on message is required to send ephemeral reply")]
    MissingUser,

    /// An emoji word was requested but no letter map is configured.
    #[error("add emoji letters to the bot to use emoji word reactions")]
    MissingLetterMap,

    /// The letter map could not spell a word.
    #[error(transparent)]
    Letters(#[from] LetterMapError),

    /// A channel target could not be resolved.
    #[error("channel #{0} not found")]
    ChannelNotFound(String),

    /// A reaction targets something that is not a message.
    #[error("no message to react to in #{0}")]
    NoMessageToReact(String),
}

/// Result type for action execution.
pub type ActionResult<T> = Result<T, ActionError>;

/// What a handler may fail with.
///
/// A [`Message`](Self::Message) is shown to the user verbatim; every other
/// variant is shown with its debug structure attached.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// A user-facing message.
    #[error("{0}")]
    Message(String),

    /// Building a response failed.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// An API call made by the handler failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Handler arguments could not be built.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Any other error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ResponseError {
    /// Creates a user-facing message error.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Wraps any error.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(err))
    }

    /// Whether the error is a plain message, shown without debug output.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    /// Formats the error for an ephemeral reply.
    pub fn to_user_text(&self) -> String {
        UserText(self).to_string()
    }
}

impl From<String> for ResponseError {
    fn from(msg: String) -> Self {
        Self::Message(msg)
    }
}

impl From<&str> for ResponseError {
    fn from(msg: &str) -> Self {
        Self::Message(msg.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ResponseError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

struct UserText<'a>(&'a ResponseError);

impl fmt::Display for UserText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "There was a problem with your response:\n> {}", self.0)?;
        if !self.0.is_message() {
            write!(f, "\n```\n{:#?}\n```", self.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_verbatim() {
        let text = ResponseError::from("boom").to_user_text();
        assert_eq!(text, "There was a problem with your response:\n> boom");
    }

    #[test]
    fn test_structured_error_has_debug_block() {
        let err = ResponseError::from(ActionError::ChannelNotFound("ops".into()));
        let text = err.to_user_text();

        assert!(text.starts_with("There was a problem with your response:\n> channel #ops not found"));
        assert!(text.contains("```\nAction(\n"));
        assert!(text.ends_with("\n```"));
    }

    #[test]
    fn test_reaction_error_names_emoji() {
        let err = ActionError::Reaction {
            emoji: "tada".into(),
            source: ApiError::platform("reactions.add", "invalid_name"),
        };
        assert_eq!(err.to_string(), "error making reaction for `tada`");
    }
}

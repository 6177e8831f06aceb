//! Handler argument extraction.
//!
//! A handler is any async function whose parameters implement
//! [`FromHandlerContext`]. The registry builds a [`HandlerContext`] for every
//! matched rule and each parameter pulls what it needs out of it.
//!
//! ```rust,ignore
//! use quip_framework::extractor::{Captures, Text};
//!
//! async fn echo(Text(rest): Text) -> String {
//!     rest
//! }
//!
//! async fn ticket(msg: Arc<InboundMessage>, Captures(groups): Captures) -> String {
//!     format!("{} asked about {:?}", msg.sender_name().unwrap_or("someone"), groups[1])
//! }
//! ```

use std::sync::Arc;

use quip_core::{InboundMessage, ReactionEvent, WebApi, WorkspaceDirectory};

use crate::error::ExtractError;
use crate::outcome::{Extracted, MatchedUrl};
use crate::response::ActionContext;

// ============================================================================
// HandlerContext
// ============================================================================

/// Everything a handler invocation can draw its arguments from.
#[derive(Clone)]
pub struct HandlerContext {
    message: Arc<InboundMessage>,
    reaction: Option<Arc<ReactionEvent>>,
    extracted: Arc<Vec<Extracted>>,
    services: ActionContext,
}

impl HandlerContext {
    /// Creates the context for a message handler.
    pub fn for_message(
        message: Arc<InboundMessage>,
        extracted: Vec<Extracted>,
        services: ActionContext,
    ) -> Self {
        Self {
            message,
            reaction: None,
            extracted: Arc::new(extracted),
            services,
        }
    }

    /// Creates the context for a reaction handler; `message` is the message
    /// reacted to.
    pub fn for_reaction(
        message: Arc<InboundMessage>,
        reaction: Arc<ReactionEvent>,
        extracted: Vec<Extracted>,
        services: ActionContext,
    ) -> Self {
        Self {
            message,
            reaction: Some(reaction),
            extracted: Arc::new(extracted),
            services,
        }
    }

    /// The message the handler responds to.
    pub fn message(&self) -> &Arc<InboundMessage> {
        &self.message
    }

    /// The reaction, for reaction handlers.
    pub fn reaction(&self) -> Option<&Arc<ReactionEvent>> {
        self.reaction.as_ref()
    }

    /// Values emitted by the matcher, in chain order.
    pub fn extracted(&self) -> &[Extracted] {
        &self.extracted
    }

    /// The API and directory actions run against.
    pub fn services(&self) -> &ActionContext {
        &self.services
    }

    fn find<'a, T: ?Sized>(&'a self, pick: impl Fn(&'a Extracted) -> Option<&'a T>) -> Option<&'a T> {
        let mut found = None;
        for value in self.extracted.iter() {
            value.walk(&mut |v| {
                if found.is_none() {
                    found = pick(v);
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }
}

// ============================================================================
// FromHandlerContext
// ============================================================================

/// A type that can be built from a [`HandlerContext`].
///
/// Extraction failing is a handler failure: the user who sent the message is
/// told about it, as with any other handler error.
///
/// # Example
///
/// ```rust,ignore
/// struct Sender(String);
///
/// impl FromHandlerContext for Sender {
///     fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
///         ctx.message()
///             .sender_id()
///             .map(|id| Sender(id.to_string()))
///             .ok_or_else(|| ExtractError::custom("message has no sender"))
///     }
/// }
/// ```
pub trait FromHandlerContext: Sized {
    /// Attempts to build this value from the context.
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError>;
}

impl<T: FromHandlerContext> FromHandlerContext for Option<T> {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        Ok(T::from_handler_context(ctx).ok())
    }
}

impl FromHandlerContext for Arc<InboundMessage> {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        Ok(Arc::clone(&ctx.message))
    }
}

impl FromHandlerContext for Arc<ReactionEvent> {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        ctx.reaction.clone().ok_or(ExtractError::NotAReaction)
    }
}

impl FromHandlerContext for WorkspaceDirectory {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        Ok(ctx.services.directory().clone())
    }
}

impl FromHandlerContext for Arc<dyn WebApi> {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        Ok(Arc::clone(ctx.services.api()))
    }
}

/// All values emitted by the matcher, unflattened.
#[derive(Debug, Clone)]
pub struct Args(pub Vec<Extracted>);

impl FromHandlerContext for Args {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        Ok(Args(ctx.extracted.as_ref().clone()))
    }
}

/// The first text remainder emitted by the matcher (from `starts_with`).
#[derive(Debug, Clone)]
pub struct Text(pub String);

impl FromHandlerContext for Text {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        ctx.find(Extracted::as_text)
            .map(|text| Text(text.to_string()))
            .ok_or(ExtractError::Missing { kind: "text" })
    }
}

/// The first regex captures emitted by the matcher (from `matches`, or a
/// regex reaction pattern).
#[derive(Debug, Clone)]
pub struct Captures(pub Vec<Option<String>>);

impl Captures {
    /// Returns capture group `index`, if it participated in the match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|group| group.as_deref())
    }
}

impl FromHandlerContext for Captures {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        ctx.find(Extracted::as_captures)
            .map(|groups| Captures(groups.to_vec()))
            .ok_or(ExtractError::Missing { kind: "captures" })
    }
}

/// The first list of links emitted by the matcher (from `url`).
#[derive(Debug, Clone)]
pub struct Urls(pub Vec<MatchedUrl>);

impl FromHandlerContext for Urls {
    fn from_handler_context(ctx: &HandlerContext) -> Result<Self, ExtractError> {
        ctx.find(Extracted::as_urls)
            .map(|urls| Urls(urls.to_vec()))
            .ok_or(ExtractError::Missing { kind: "urls" })
    }
}

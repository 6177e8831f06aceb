//! # Quip Framework
//!
//! The rule-matching and response pipeline of the Quip bot framework.
//!
//! - [`Matcher`]: an immutable chain of predicate and extraction steps over
//!   a message, started with [`all`], [`directed_at_bot`] and friends.
//! - [`Handler`]: async functions whose parameters are extractors and whose
//!   return value converts into [`OutboundAction`]s.
//! - [`HandlerRegistry`]: primary, fallthrough and reaction rules and the
//!   dispatch algorithm that runs them with per-handler error isolation.
//! - [`DispatchService`]: the registry as a `tower::Service`, with
//!   [`EventFilter`] as the tower filter in front of it.
//!
//! ```rust,ignore
//! use quip_framework::prelude::*;
//!
//! let mut registry = HandlerRegistry::new();
//! registry
//!     .register_primary(directed_at_bot().contains(["hi"]), || async { "hi there" })
//!     .register_fallthrough(directed_at_bot(), |msg: Arc<InboundMessage>| async move {
//!         msg.emoji_reaction(["shrug"])
//!     });
//! ```

pub mod error;
pub mod extractor;
pub mod handler;
pub mod letter_map;
pub mod matcher;
pub mod matcher_builders;
pub mod outcome;
pub mod registry;
pub mod response;
pub mod service;

pub use error::{
    ActionError, ActionResult, EventSkipped, ExtractError, ExtractResult, LetterMapError,
    ResponseError,
};
pub use extractor::{Args, Captures, FromHandlerContext, HandlerContext, Text, Urls};
pub use handler::{BoxedHandler, ErasedHandler, Handler, HandlerFn, HandlerOutput, into_handler};
pub use letter_map::{EmojiLetterMap, LetterEmojis};
pub use matcher::{CheckFn, KeyFn, Matcher, ThrottleLock, UrlFilter};
pub use matcher_builders::{all, directed_at_bot, is_direct_message, mentions_bot};
pub use outcome::{Extracted, MatchOutcome, MatchedUrl};
pub use registry::{
    DispatchFailure, DispatchReport, FailureStage, HandlerRegistry, ReactionPattern,
};
pub use response::{
    Action, ActionContext, ActionOutput, DEFAULT_REACTION_DELAY, EmojiWordReaction,
    EmojisReaction, EphemeralReply, IntoResponses, MessageExt, MessagePayload, OutboundAction,
    Reply, ReplyWithThread,
};
pub use service::{DEFAULT_IGNORED_SUBTYPES, DispatchService, EventFilter};

/// Prelude for writing rules.
pub mod prelude {
    pub use super::{
        Args, Captures, HandlerRegistry, Matcher, MessageExt, OutboundAction, ResponseError,
        Text, UrlFilter, Urls, all, directed_at_bot, is_direct_message, mentions_bot,
    };
}

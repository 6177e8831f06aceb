//! Outbound actions and how handler results become them.
//!
//! A handler returns anything implementing [`IntoResponses`]: nothing, a
//! string (a reply to the message), a single [`OutboundAction`], or a list.
//! The registry executes the resulting actions one after another against an
//! [`ActionContext`].
//!
//! ```rust,ignore
//! use quip_framework::response::MessageExt;
//!
//! async fn hype(msg: Arc<InboundMessage>) -> Vec<OutboundAction> {
//!     vec![
//!         msg.reply_thread("on it"),
//!         msg.emoji_reaction(["tada", "rocket"]),
//!     ]
//! }
//! ```

mod ephemeral;
mod reaction;
mod reply;
mod thread;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quip_core::{
    DirectoryOptions, InboundMessage, PostMessage, PostedMessage, ReplyTarget, WebApi,
    WorkspaceDirectory,
};
use serde_json::Value;

use crate::error::{ActionError, ActionResult, ResponseError};
use crate::letter_map::EmojiLetterMap;

pub use ephemeral::EphemeralReply;
pub use reaction::{EmojiWordReaction, EmojisReaction};
pub use reply::Reply;
pub use thread::ReplyWithThread;

/// Pause between two reactions of one action.
pub const DEFAULT_REACTION_DELAY: Duration = Duration::from_millis(50);

// ============================================================================
// MessagePayload
// ============================================================================

/// The body of a posted message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    /// Plain text.
    Text(String),
    /// A single attachment with no text.
    Attachment(Value),
    /// Several attachments with no text.
    Attachments(Vec<Value>),
    /// Layout blocks, with fallback text for notifications.
    Blocks {
        /// Fallback text.
        text: String,
        /// The blocks, passed through untouched.
        blocks: Vec<Value>,
    },
}

impl MessagePayload {
    /// Builds the post for `channel`, optionally inside a thread.
    pub fn to_post(&self, channel: impl Into<String>, thread_ts: Option<String>) -> PostMessage {
        let mut post = PostMessage {
            channel: channel.into(),
            thread_ts,
            ..Default::default()
        };
        match self {
            Self::Text(text) => post.text = text.clone(),
            Self::Attachment(attachment) => post.attachments = vec![attachment.clone()],
            Self::Attachments(attachments) => post.attachments = attachments.clone(),
            Self::Blocks { text, blocks } => {
                post.text = text.clone();
                post.blocks = blocks.clone();
            }
        }
        post
    }
}

impl From<&str> for MessagePayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessagePayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for MessagePayload {
    fn from(attachment: Value) -> Self {
        Self::Attachment(attachment)
    }
}

impl From<Vec<Value>> for MessagePayload {
    fn from(attachments: Vec<Value>) -> Self {
        Self::Attachments(attachments)
    }
}

// ============================================================================
// ActionContext
// ============================================================================

/// What actions execute against.
#[derive(Clone)]
pub struct ActionContext {
    api: Arc<dyn WebApi>,
    directory: WorkspaceDirectory,
    letters: Option<Arc<EmojiLetterMap>>,
    reaction_delay: Duration,
}

impl ActionContext {
    /// Creates a context over an API client and the directory built on it.
    pub fn new(api: Arc<dyn WebApi>, directory: WorkspaceDirectory) -> Self {
        Self {
            api,
            directory,
            letters: None,
            reaction_delay: DEFAULT_REACTION_DELAY,
        }
    }

    /// Creates a context with a fresh directory using default cache settings.
    pub fn from_api(api: Arc<dyn WebApi>) -> Self {
        let directory = WorkspaceDirectory::from_api(Arc::clone(&api), DirectoryOptions::default());
        Self::new(api, directory)
    }

    /// Sets the letter map used by emoji word reactions.
    pub fn with_letters(mut self, letters: Arc<EmojiLetterMap>) -> Self {
        self.letters = Some(letters);
        self
    }

    /// Sets the pause between reactions.
    pub fn with_reaction_delay(mut self, delay: Duration) -> Self {
        self.reaction_delay = delay;
        self
    }

    /// The API client.
    pub fn api(&self) -> &Arc<dyn WebApi> {
        &self.api
    }

    /// The workspace directory.
    pub fn directory(&self) -> &WorkspaceDirectory {
        &self.directory
    }

    /// The letter map, if one is configured.
    pub fn letters(&self) -> Option<&Arc<EmojiLetterMap>> {
        self.letters.as_ref()
    }

    /// The pause between reactions.
    pub fn reaction_delay(&self) -> Duration {
        self.reaction_delay
    }

    /// Resolves the conversation a target points at.
    pub async fn resolve_conversation(&self, target: &ReplyTarget) -> ActionResult<String> {
        match target {
            ReplyTarget::Message {
                conversation_id, ..
            }
            | ReplyTarget::SharedMessage {
                conversation_id, ..
            } => Ok(conversation_id.clone()),
            ReplyTarget::ChannelNamed(name) => self
                .directory
                .channel_named(name)
                .await?
                .map(|channel| channel.id)
                .ok_or_else(|| ActionError::ChannelNotFound(name.clone())),
        }
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("directory", &self.directory)
            .field("letters", &self.letters)
            .field("reaction_delay", &self.reaction_delay)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Action
// ============================================================================

/// What an executed action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutput {
    /// A message was posted.
    Posted(PostedMessage),
    /// A message was posted and answered in its thread.
    Threaded {
        /// The thread parent.
        primary: PostedMessage,
        /// The replies, in order.
        replies: Vec<PostedMessage>,
    },
    /// An ephemeral message was shown.
    Ephemeral,
    /// Reactions were added, in order.
    Reacted(Vec<String>),
}

/// Something that can be executed against the platform.
#[async_trait]
pub trait Action: Send + Sync {
    /// Performs the action.
    async fn execute(&self, ctx: &ActionContext) -> ActionResult<ActionOutput>;
}

/// One response produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundAction {
    /// Post a message.
    Reply(Reply),
    /// Post a message, then answer it in its thread.
    ReplyWithThread(ReplyWithThread),
    /// Show a message to one user only.
    Ephemeral(EphemeralReply),
    /// Add a list of reactions.
    Emojis(EmojisReaction),
    /// Spell a word with reactions.
    EmojiWord(EmojiWordReaction),
}

impl OutboundAction {
    /// A short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reply(_) => "reply",
            Self::ReplyWithThread(_) => "reply_with_thread",
            Self::Ephemeral(_) => "ephemeral_reply",
            Self::Emojis(_) => "emojis_reaction",
            Self::EmojiWord(_) => "emoji_word_reaction",
        }
    }
}

#[async_trait]
impl Action for OutboundAction {
    async fn execute(&self, ctx: &ActionContext) -> ActionResult<ActionOutput> {
        match self {
            Self::Reply(action) => action.execute(ctx).await,
            Self::ReplyWithThread(action) => action.execute(ctx).await,
            Self::Ephemeral(action) => action.execute(ctx).await,
            Self::Emojis(action) => action.execute(ctx).await,
            Self::EmojiWord(action) => action.execute(ctx).await,
        }
    }
}

macro_rules! impl_from_action {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for OutboundAction {
                fn from(action: $ty) -> Self {
                    Self::$variant(action)
                }
            }

            impl IntoResponses for $ty {
                fn into_responses(self, _message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
                    Ok(vec![self.into()])
                }
            }
        )*
    };
}

impl_from_action!(
    Reply(Reply),
    ReplyWithThread(ReplyWithThread),
    Ephemeral(EphemeralReply),
    Emojis(EmojisReaction),
    EmojiWord(EmojiWordReaction),
);

// ============================================================================
// IntoResponses
// ============================================================================

/// Conversion of a handler's return value into outbound actions.
///
/// Plain text becomes a [`Reply`] to the message; empty text and `None`
/// produce nothing; lists are flattened in order.
pub trait IntoResponses {
    /// Converts `self`, using `message` as the default reply target.
    fn into_responses(self, message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError>;
}

impl IntoResponses for () {
    fn into_responses(self, _message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
        Ok(Vec::new())
    }
}

impl IntoResponses for &'static str {
    fn into_responses(self, message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
        self.to_string().into_responses(message)
    }
}

impl IntoResponses for String {
    fn into_responses(self, message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![message.reply(self)])
    }
}

impl IntoResponses for MessagePayload {
    fn into_responses(self, message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
        Ok(vec![message.reply(self)])
    }
}

impl IntoResponses for OutboundAction {
    fn into_responses(self, _message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
        Ok(vec![self])
    }
}

impl<T: IntoResponses> IntoResponses for Option<T> {
    fn into_responses(self, message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
        match self {
            Some(inner) => inner.into_responses(message),
            None => Ok(Vec::new()),
        }
    }
}

impl<T: IntoResponses> IntoResponses for Vec<T> {
    fn into_responses(self, message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
        let mut actions = Vec::new();
        for item in self {
            actions.extend(item.into_responses(message)?);
        }
        Ok(actions)
    }
}

impl<T, E> IntoResponses for Result<T, E>
where
    T: IntoResponses,
    E: Into<ResponseError>,
{
    fn into_responses(self, message: &InboundMessage) -> Result<Vec<OutboundAction>, ResponseError> {
        self.map_err(Into::into)?.into_responses(message)
    }
}

// ============================================================================
// MessageExt
// ============================================================================

/// Response constructors on a message.
///
/// Replies and reactions go to the message's [`ReplyTarget`], which for a
/// message shared into a direct conversation is the shared message.
pub trait MessageExt {
    /// Replies in the message's conversation.
    fn reply(&self, payload: impl Into<MessagePayload>) -> OutboundAction;

    /// Replies in the message's thread.
    fn reply_thread(&self, payload: impl Into<MessagePayload>) -> OutboundAction;

    /// Posts `primary`, then each of `thread` as replies to it.
    fn reply_with_thread<I, P>(&self, primary: impl Into<MessagePayload>, thread: I) -> OutboundAction
    where
        I: IntoIterator<Item = P>,
        P: Into<MessagePayload>;

    /// Replies visibly to the sender only.
    fn ephemeral(&self, text: impl Into<String>) -> ActionResult<OutboundAction>;

    /// Reacts with each emoji in turn.
    fn emoji_reaction<I, S>(&self, emojis: I) -> OutboundAction
    where
        I: IntoIterator<Item = S>,
        S: Into<String>;

    /// Spells `word` with reactions.
    fn emoji_word_reaction(&self, word: impl Into<String>) -> OutboundAction;
}

impl MessageExt for InboundMessage {
    fn reply(&self, payload: impl Into<MessagePayload>) -> OutboundAction {
        Reply::new(self.reply_target().clone(), payload).into()
    }

    fn reply_thread(&self, payload: impl Into<MessagePayload>) -> OutboundAction {
        let target = self.reply_target().clone();
        let thread_ts = target.ts().map(str::to_string);
        Reply::new(target, payload).in_thread(thread_ts).into()
    }

    fn reply_with_thread<I, P>(&self, primary: impl Into<MessagePayload>, thread: I) -> OutboundAction
    where
        I: IntoIterator<Item = P>,
        P: Into<MessagePayload>,
    {
        ReplyWithThread::new(self.reply_target().clone(), primary, thread).into()
    }

    fn ephemeral(&self, text: impl Into<String>) -> ActionResult<OutboundAction> {
        EphemeralReply::to_sender(self, text).map(Into::into)
    }

    fn emoji_reaction<I, S>(&self, emojis: I) -> OutboundAction
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EmojisReaction::new(self.reply_target().clone(), emojis).into()
    }

    fn emoji_word_reaction(&self, word: impl Into<String>) -> OutboundAction {
        EmojiWordReaction::new(self.reply_target().clone(), word).into()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_becomes_reply() {
        let msg = message("C1", "hi");
        let actions = "hi there".into_responses(&msg).unwrap();

        assert_eq!(actions.len(), 1);
        let OutboundAction::Reply(reply) = &actions[0] else {
            panic!("expected reply, got {:?}", actions[0]);
        };
        assert_eq!(reply.payload, MessagePayload::Text("hi there".into()));
        assert_eq!(reply.target.conversation_id(), Some("C1"));
        assert_eq!(reply.thread_ts, None);
    }

    #[test]
    fn test_empty_and_none_produce_nothing() {
        let msg = message("C1", "hi");
        assert!(String::new().into_responses(&msg).unwrap().is_empty());
        assert!(None::<String>.into_responses(&msg).unwrap().is_empty());
        assert!(().into_responses(&msg).unwrap().is_empty());
    }

    #[test]
    fn test_lists_flatten_in_order() {
        let msg = message("C1", "hi");
        let nested = vec![
            vec![msg.reply("one"), msg.emoji_reaction(["wave"])],
            vec![msg.reply_thread("two")],
        ];

        let kinds: Vec<_> = nested
            .into_responses(&msg)
            .unwrap()
            .iter()
            .map(OutboundAction::kind)
            .collect();
        assert_eq!(kinds, ["reply", "emojis_reaction", "reply"]);
    }

    #[test]
    fn test_error_result_propagates() {
        let msg = message("C1", "hi");
        let result: Result<String, &str> = Err("boom");
        assert!(matches!(
            result.into_responses(&msg),
            Err(ResponseError::Message(ref m)) if m == "boom"
        ));
    }

    #[test]
    fn test_shared_message_is_reply_target() {
        let msg = shared_into_dm();
        let OutboundAction::Reply(reply) = msg.reply_thread("seen it") else {
            panic!("expected reply");
        };
        assert_eq!(reply.target.conversation_id(), Some("C9"));
        assert_eq!(reply.thread_ts.as_deref(), Some("55.5"));
    }

    #[test]
    fn test_payload_to_post() {
        let attachment = json!({ "title": "card" });
        let post = MessagePayload::from(attachment.clone()).to_post("C1", Some("1.0".into()));

        assert_eq!(post.text, "");
        assert_eq!(post.attachments, vec![attachment]);
        assert_eq!(post.thread_ts.as_deref(), Some("1.0"));
    }
}

//! Normalized view of an inbound message.

use std::sync::{LazyLock, OnceLock};

use regex::Regex;

use crate::directory::WorkspaceDirectory;
use crate::error::ApiResult;
use crate::foundation::event::{Attachment, MessageEventData};
use crate::foundation::links::{Link, extract_links};
use crate::integration::api::{Channel, DirectConversation, User};

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^<@(\w+)>:?\s*(.*)").expect("mention pattern is valid")
});

// ============================================================================
// ReplyTarget
// ============================================================================

/// Where responses to a message are sent.
///
/// Decided once, when the message is built: a direct message whose first
/// attachment is a share is answered on the shared message instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// The message itself.
    Message {
        /// Conversation the message was posted in.
        conversation_id: String,
        /// Timestamp of the message.
        ts: String,
    },
    /// A message shared into a direct conversation with the bot.
    SharedMessage {
        /// Conversation of the shared message.
        conversation_id: String,
        /// Timestamp of the shared message.
        ts: String,
    },
    /// A channel looked up by name when the response is executed.
    ChannelNamed(String),
}

impl ReplyTarget {
    /// Targets a channel by name; a leading `#` is ignored.
    pub fn channel_named(name: impl AsRef<str>) -> Self {
        Self::ChannelNamed(name.as_ref().trim_start_matches('#').to_string())
    }

    /// Returns the conversation id, unless it still has to be resolved.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::Message {
                conversation_id, ..
            }
            | Self::SharedMessage {
                conversation_id, ..
            } => Some(conversation_id),
            Self::ChannelNamed(_) => None,
        }
    }

    /// Returns the timestamp of the targeted message, if there is one.
    pub fn ts(&self) -> Option<&str> {
        match self {
            Self::Message { ts, .. } | Self::SharedMessage { ts, .. } => Some(ts),
            Self::ChannelNamed(_) => None,
        }
    }
}

// ============================================================================
// InboundMessage
// ============================================================================

/// An inbound message with its sender, channel and direct-conversation
/// context resolved.
///
/// Immutable once built. Links are extracted on first access and memoized.
#[derive(Debug)]
pub struct InboundMessage {
    data: MessageEventData,
    bot_user_id: String,
    user: Option<User>,
    channel: Option<Channel>,
    direct_conversation: Option<DirectConversation>,
    mentions_bot: bool,
    resolved_text: Option<String>,
    reply_target: ReplyTarget,
    links: OnceLock<Vec<Link>>,
}

impl InboundMessage {
    /// Builds a message, resolving its context through `directory`.
    pub async fn build(
        data: MessageEventData,
        bot_user_id: &str,
        directory: &WorkspaceDirectory,
    ) -> ApiResult<Self> {
        let user_lookup = async {
            match data.user.as_deref() {
                Some(id) => directory.user(id).await,
                None => Ok(None),
            }
        };
        let (user, channel, direct_conversation) = futures::try_join!(
            user_lookup,
            directory.channel(&data.channel),
            directory.direct_conversation(&data.channel)
        )?;

        Ok(Self::new(
            data,
            bot_user_id,
            user,
            channel,
            direct_conversation,
        ))
    }

    /// Creates a message from already-resolved context.
    pub fn new(
        data: MessageEventData,
        bot_user_id: impl Into<String>,
        user: Option<User>,
        channel: Option<Channel>,
        direct_conversation: Option<DirectConversation>,
    ) -> Self {
        let bot_user_id = bot_user_id.into();

        let mention = data
            .text
            .as_deref()
            .and_then(|text| MENTION.captures(text))
            .filter(|caps| caps.get(1).is_some_and(|id| id.as_str() == bot_user_id));
        let mentions_bot = mention.is_some();
        let resolved_text = mention
            .and_then(|caps| caps.get(2))
            .map(|rest| rest.as_str().to_string());

        let shared = direct_conversation
            .as_ref()
            .and_then(|_| data.attachments.first())
            .filter(|attachment| attachment.is_share)
            .and_then(|attachment| {
                Some(ReplyTarget::SharedMessage {
                    conversation_id: attachment.channel_id.clone()?,
                    ts: attachment.ts.clone()?,
                })
            });
        let reply_target = shared.unwrap_or_else(|| ReplyTarget::Message {
            conversation_id: data.channel.clone(),
            ts: data.ts.clone(),
        });

        Self {
            data,
            bot_user_id,
            user,
            channel,
            direct_conversation,
            mentions_bot,
            resolved_text,
            reply_target,
            links: OnceLock::new(),
        }
    }

    /// Timestamp of the message; its identifier within the conversation.
    pub fn ts(&self) -> &str {
        &self.data.ts
    }

    /// Parent thread timestamp, when posted in a thread.
    pub fn thread_ts(&self) -> Option<&str> {
        self.data.thread_ts.as_deref()
    }

    /// Id of the sender.
    pub fn sender_id(&self) -> Option<&str> {
        self.data.user.as_deref()
    }

    /// The resolved sender.
    pub fn sender(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Display name of the sender.
    pub fn sender_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.name.as_str())
    }

    /// Id of the conversation the message was posted in.
    pub fn conversation_id(&self) -> &str {
        &self.data.channel
    }

    /// The bot's own user id.
    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    /// Text as sent, mention included.
    pub fn raw_text(&self) -> &str {
        self.data.text.as_deref().unwrap_or_default()
    }

    /// Text with a leading mention of the bot stripped.
    pub fn text(&self) -> &str {
        self.resolved_text
            .as_deref()
            .unwrap_or_else(|| self.raw_text())
    }

    /// Whether the message starts with a mention of the bot.
    pub fn mentions_bot(&self) -> bool {
        self.mentions_bot
    }

    /// Whether the message was sent in a direct conversation with the bot.
    pub fn is_direct_message(&self) -> bool {
        self.direct_conversation.is_some()
    }

    /// Direct message or mention.
    pub fn directed_at_bot(&self) -> bool {
        self.is_direct_message() || self.mentions_bot
    }

    /// The resolved channel, if posted in a named channel.
    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    /// Name of the channel, without a leading `#`.
    pub fn channel_name(&self) -> Option<&str> {
        self.channel
            .as_ref()
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// The resolved direct conversation, if posted in one.
    pub fn direct_conversation(&self) -> Option<&DirectConversation> {
        self.direct_conversation.as_ref()
    }

    /// Message subtype, if any.
    pub fn subtype(&self) -> Option<&str> {
        self.data.subtype.as_deref()
    }

    /// Attachments of the message.
    pub fn attachments(&self) -> &[Attachment] {
        &self.data.attachments
    }

    /// Links in the message text, parsed on first access.
    pub fn extracted_links(&self) -> &[Link] {
        self.links.get_or_init(|| extract_links(self.raw_text()))
    }

    /// Where responses go.
    pub fn reply_target(&self) -> &ReplyTarget {
        &self.reply_target
    }

    /// The raw event payload.
    pub fn data(&self) -> &MessageEventData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryOptions;
    use crate::integration::recording::RecordingApi;
    use std::sync::Arc;

    fn data(channel: &str, text: &str) -> MessageEventData {
        MessageEventData {
            ts: "1.0".into(),
            text: Some(text.into()),
            user: Some("U1".into()),
            channel: channel.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_mention_is_stripped() {
        let message =
            InboundMessage::new(data("C1", "<@UBOT>: hello\nthere"), "UBOT", None, None, None);

        assert!(message.mentions_bot());
        assert!(message.directed_at_bot());
        assert!(!message.is_direct_message());
        assert_eq!(message.text(), "hello\nthere");
        assert_eq!(message.raw_text(), "<@UBOT>: hello\nthere");
    }

    #[test]
    fn test_other_mention_is_kept() {
        let message = InboundMessage::new(data("C1", "<@U9> hello"), "UBOT", None, None, None);

        assert!(!message.mentions_bot());
        assert!(!message.directed_at_bot());
        assert_eq!(message.text(), "<@U9> hello");
    }

    #[test]
    fn test_shared_message_target() {
        let mut raw = data("D1", "");
        raw.attachments.push(Attachment {
            is_share: true,
            channel_id: Some("C7".into()),
            ts: Some("9.0".into()),
            ..Default::default()
        });
        let dm = DirectConversation {
            id: "D1".into(),
            user: "U1".into(),
            is_user_deleted: false,
        };

        let message = InboundMessage::new(raw, "UBOT", None, None, Some(dm));

        assert_eq!(
            message.reply_target(),
            &ReplyTarget::SharedMessage {
                conversation_id: "C7".into(),
                ts: "9.0".into()
            }
        );
    }

    #[test]
    fn test_share_outside_dm_targets_message() {
        let mut raw = data("C1", "");
        raw.attachments.push(Attachment {
            is_share: true,
            channel_id: Some("C7".into()),
            ts: Some("9.0".into()),
            ..Default::default()
        });

        let message = InboundMessage::new(raw, "UBOT", None, None, None);

        assert_eq!(message.reply_target().conversation_id(), Some("C1"));
        assert_eq!(message.reply_target().ts(), Some("1.0"));
    }

    #[test]
    fn test_links_are_memoized() {
        let message = InboundMessage::new(
            data("C1", "see <https://example.com/a|here>"),
            "UBOT",
            None,
            None,
            None,
        );

        let first = message.extracted_links().as_ptr();
        assert_eq!(message.extracted_links().len(), 1);
        assert_eq!(message.extracted_links().as_ptr(), first);
    }

    #[tokio::test]
    async fn test_build_resolves_context() {
        let api = Arc::new(
            RecordingApi::new()
                .with_channel("C1", "general")
                .with_direct_conversation("D1", "U1")
                .with_user("U1", "ann"),
        );
        let directory = WorkspaceDirectory::from_api(api, DirectoryOptions::default());

        let in_channel = InboundMessage::build(data("C1", "hi"), "UBOT", &directory)
            .await
            .unwrap();
        assert_eq!(in_channel.channel_name(), Some("general"));
        assert_eq!(in_channel.sender_name(), Some("ann"));
        assert!(!in_channel.is_direct_message());

        let in_dm = InboundMessage::build(data("D1", "hi"), "UBOT", &directory)
            .await
            .unwrap();
        assert!(in_dm.is_direct_message());
        assert!(in_dm.directed_at_bot());
        assert_eq!(in_dm.channel_name(), None);
    }
}

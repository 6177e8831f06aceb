//! Raw inbound events as delivered by the event stream.
//!
//! These are thin serde models of the platform payloads. They are normalized
//! into [`InboundMessage`](super::message::InboundMessage) and
//! [`ReactionEvent`](super::reaction::ReactionEvent) before any rule sees them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// InboundEvent
// ============================================================================

/// An event received from the event stream.
///
/// Tagged on the payload's `type` field. Event types the framework does not
/// handle deserialize to [`InboundEvent::Unsupported`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A message was posted.
    Message(MessageEventData),
    /// A reaction was added to an item.
    ReactionAdded(ReactionAddedData),
    /// Any other event type.
    #[serde(other)]
    Unsupported,
}

impl InboundEvent {
    /// Parses an event from its JSON payload.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Returns the event's wire name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::ReactionAdded(_) => "reaction_added",
            Self::Unsupported => "unsupported",
        }
    }

    /// Returns the conversation the event happened in, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::Message(m) => Some(&m.channel),
            Self::ReactionAdded(r) => Some(&r.item.channel),
            Self::Unsupported => None,
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// Payload of a `message` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageEventData {
    /// Timestamp of the message; also its identifier within the conversation.
    pub ts: String,
    /// Raw text of the message.
    #[serde(default)]
    pub text: Option<String>,
    /// Id of the sending user.
    #[serde(default)]
    pub user: Option<String>,
    /// Id of the conversation (channel, DM, group) the message was posted in.
    #[serde(default)]
    pub channel: String,
    /// Message subtype (`bot_message`, `message_deleted`, ...).
    #[serde(default)]
    pub subtype: Option<String>,
    /// Parent thread timestamp, when posted in a thread.
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// Attachments, including shared messages.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A message attachment.
///
/// Only the fields the framework inspects are typed; everything else is kept
/// in `extra` so the attachment can be posted back verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
    /// Whether this attachment is a shared message.
    #[serde(default)]
    pub is_share: bool,
    /// Conversation of the shared message.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Timestamp of the shared message.
    #[serde(default)]
    pub ts: Option<String>,
    /// Text of the attachment.
    #[serde(default)]
    pub text: Option<String>,
    /// Remaining attachment fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Reaction
// ============================================================================

/// Payload of a `reaction_added` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionAddedData {
    /// Reaction code, possibly carrying a skin tone (`wave::skin-tone-4`).
    pub reaction: String,
    /// Id of the reacting user.
    pub user: String,
    /// Timestamp of the reaction.
    #[serde(alias = "ts")]
    pub event_ts: String,
    /// Reference to the item reacted to.
    pub item: ReactionItem,
    /// Author of the item reacted to.
    #[serde(default)]
    pub item_user: Option<String>,
}

/// Reference to the item a reaction was added to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionItem {
    /// Item kind, usually `message`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Conversation containing the item.
    pub channel: String,
    /// Timestamp of the item.
    pub ts: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message() {
        let event = InboundEvent::from_value(json!({
            "type": "message",
            "ts": "1.0",
            "text": "hi",
            "user": "U1",
            "channel": "D1"
        }))
        .unwrap();

        let InboundEvent::Message(data) = event else {
            panic!("expected message");
        };
        assert_eq!(data.text.as_deref(), Some("hi"));
        assert_eq!(data.channel, "D1");
        assert!(data.attachments.is_empty());
    }

    #[test]
    fn test_parse_reaction() {
        let event = InboundEvent::from_value(json!({
            "type": "reaction_added",
            "reaction": "wave::skin-tone-2",
            "user": "U1",
            "event_ts": "2.0",
            "item": { "type": "message", "channel": "C1", "ts": "1.0" }
        }))
        .unwrap();

        assert_eq!(event.event_name(), "reaction_added");
        assert_eq!(event.conversation_id(), Some("C1"));
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let event = InboundEvent::from_value(json!({ "type": "user_typing" })).unwrap();
        assert!(matches!(event, InboundEvent::Unsupported));
    }

    #[test]
    fn test_attachment_keeps_extra_fields() {
        let attachment: Attachment = serde_json::from_value(json!({
            "is_share": true,
            "channel_id": "C9",
            "ts": "3.0",
            "color": "#36a64f"
        }))
        .unwrap();

        assert!(attachment.is_share);
        assert_eq!(attachment.extra.get("color"), Some(&json!("#36a64f")));
    }
}

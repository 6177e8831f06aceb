//! Normalized view of a `reaction_added` event.

use std::sync::Arc;

use crate::directory::WorkspaceDirectory;
use crate::error::ApiResult;
use crate::foundation::emoji::normalize_emoji;
use crate::foundation::event::{ReactionAddedData, ReactionItem};
use crate::foundation::message::InboundMessage;
use crate::integration::api::{User, WebApi};

/// A reaction, with the reacting user and the message reacted to resolved.
///
/// The event only references its target, so [`build`](Self::build) fetches
/// the message. The target stays `None` when it could not be found.
#[derive(Debug)]
pub struct ReactionEvent {
    data: ReactionAddedData,
    emoji: String,
    skin_tone: Option<String>,
    user: Option<User>,
    target: Option<Arc<InboundMessage>>,
}

impl ReactionEvent {
    /// Builds a reaction event, fetching the reacted-to message.
    pub async fn build(
        data: ReactionAddedData,
        bot_user_id: &str,
        directory: &WorkspaceDirectory,
        api: &dyn WebApi,
    ) -> ApiResult<Self> {
        let (user, fetched) = futures::try_join!(
            directory.user(&data.user),
            api.fetch_message(&data.item.channel, &data.item.ts)
        )?;

        let target = match fetched {
            Some(mut message) => {
                // History entries omit the conversation they came from.
                if message.channel.is_empty() {
                    message.channel = data.item.channel.clone();
                }
                let message = InboundMessage::build(message, bot_user_id, directory).await?;
                Some(Arc::new(message))
            }
            None => None,
        };

        Ok(Self::new(data, user, target))
    }

    /// Creates a reaction event from already-resolved context.
    pub fn new(
        data: ReactionAddedData,
        user: Option<User>,
        target: Option<Arc<InboundMessage>>,
    ) -> Self {
        let (emoji, skin_tone) = normalize_emoji(&data.reaction);
        Self {
            data,
            emoji,
            skin_tone,
            user,
            target,
        }
    }

    /// Emoji name, without colons or skin tone.
    pub fn emoji_name(&self) -> &str {
        &self.emoji
    }

    /// Skin tone modifier (`skin-tone-2`), if any.
    pub fn skin_tone(&self) -> Option<&str> {
        self.skin_tone.as_deref()
    }

    /// Id of the reacting user.
    pub fn reacting_user_id(&self) -> &str {
        &self.data.user
    }

    /// The resolved reacting user.
    pub fn reacting_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Timestamp of the reaction.
    pub fn ts(&self) -> &str {
        &self.data.event_ts
    }

    /// Reference to the item reacted to.
    pub fn item(&self) -> &ReactionItem {
        &self.data.item
    }

    /// The message reacted to, if it could be fetched.
    pub fn target_message(&self) -> Option<&Arc<InboundMessage>> {
        self.target.as_ref()
    }
}

use async_trait::async_trait;
use quip_core::{InboundMessage, PostEphemeral};

use super::{Action, ActionContext, ActionOutput};
use crate::error::{ActionError, ActionResult};

/// A message only one user can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralReply {
    /// Conversation it is shown in.
    pub conversation_id: String,
    /// The user who sees it.
    pub user: String,
    /// Message text.
    pub text: String,
}

impl EphemeralReply {
    /// Addresses the sender of `message`, in the conversation it was sent in.
    ///
    /// Fails unless the sender was resolved through the directory.
    pub fn to_sender(message: &InboundMessage, text: impl Into<String>) -> ActionResult<Self> {
        let user = message.sender().ok_or(ActionError::MissingUser)?;
        Ok(Self {
            conversation_id: message.conversation_id().to_string(),
            user: user.id.clone(),
            text: text.into(),
        })
    }
}

#[async_trait]
impl Action for EphemeralReply {
    async fn execute(&self, ctx: &ActionContext) -> ActionResult<ActionOutput> {
        ctx.api()
            .post_ephemeral(&PostEphemeral {
                channel: self.conversation_id.clone(),
                user: self.user.clone(),
                text: self.text.clone(),
            })
            .await?;
        Ok(ActionOutput::Ephemeral)
    }
}

use async_trait::async_trait;
use quip_core::ReplyTarget;
use tracing::debug;

use super::{Action, ActionContext, ActionOutput, MessagePayload};
use crate::error::ActionResult;

/// Posts a message to a target, optionally inside a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Where the message goes.
    pub target: ReplyTarget,
    /// What is posted.
    pub payload: MessagePayload,
    /// Parent of the thread to post in.
    pub thread_ts: Option<String>,
}

impl Reply {
    /// Creates a top-level reply.
    pub fn new(target: ReplyTarget, payload: impl Into<MessagePayload>) -> Self {
        Self {
            target,
            payload: payload.into(),
            thread_ts: None,
        }
    }

    /// Posts into the given thread instead.
    pub fn in_thread(mut self, thread_ts: Option<String>) -> Self {
        self.thread_ts = thread_ts;
        self
    }

    /// Posts a message to a channel by name.
    pub fn to_channel(name: impl AsRef<str>, payload: impl Into<MessagePayload>) -> Self {
        Self::new(ReplyTarget::channel_named(name), payload)
    }
}

#[async_trait]
impl Action for Reply {
    async fn execute(&self, ctx: &ActionContext) -> ActionResult<ActionOutput> {
        let channel = ctx.resolve_conversation(&self.target).await?;
        let post = self.payload.to_post(channel, self.thread_ts.clone());
        let posted = ctx.api().post_message(&post).await?;
        debug!(channel = %posted.channel, ts = %posted.ts, "Posted reply");
        Ok(ActionOutput::Posted(posted))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quip_core::{ApiError, ApiMethod, RecordingApi};

    use super::*;
    use crate::error::ActionError;

    #[tokio::test]
    async fn test_reply_posts_to_conversation() {
        let api = Arc::new(RecordingApi::new());
        let ctx = ActionContext::from_api(api.clone());

        let target = ReplyTarget::Message {
            conversation_id: "C1".into(),
            ts: "1.0".into(),
        };
        let output = Reply::new(target, "hello")
            .in_thread(Some("1.0".into()))
            .execute(&ctx)
            .await
            .unwrap();

        assert!(matches!(output, ActionOutput::Posted(_)));
        let posted = api.posted_messages();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].channel, "C1");
        assert_eq!(posted[0].text, "hello");
        assert_eq!(posted[0].thread_ts.as_deref(), Some("1.0"));
    }

    #[tokio::test]
    async fn test_named_channel_is_resolved() {
        let api = Arc::new(RecordingApi::new().with_channel("C42", "general"));
        let ctx = ActionContext::from_api(api.clone());

        Reply::to_channel("#general", "morning")
            .execute(&ctx)
            .await
            .unwrap();

        assert_eq!(api.posted_messages()[0].channel, "C42");
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let api = Arc::new(RecordingApi::new());
        let ctx = ActionContext::from_api(api.clone());

        let err = Reply::to_channel("nowhere", "hello")
            .execute(&ctx)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "channel #nowhere not found");
        assert_eq!(api.call_count(ApiMethod::PostMessage), 0);
    }

    #[tokio::test]
    async fn test_post_failure_surfaces() {
        let api = Arc::new(
            RecordingApi::new().fail_on(
                ApiMethod::PostMessage,
                ApiError::platform("chat.postMessage", "not_in_channel"),
            ),
        );
        let ctx = ActionContext::from_api(api);

        let target = ReplyTarget::Message {
            conversation_id: "C1".into(),
            ts: "1.0".into(),
        };
        let err = Reply::new(target, "x").execute(&ctx).await.unwrap_err();
        assert!(matches!(err, ActionError::Api(ApiError::Platform { .. })));
    }
}

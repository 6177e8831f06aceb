use async_trait::async_trait;
use quip_core::ReplyTarget;
use tracing::debug;

use super::{Action, ActionContext, ActionOutput, MessagePayload};
use crate::error::{ActionError, ActionResult};

/// Posts a message, then posts follow-ups as replies in its thread.
///
/// Follow-ups are posted in order once the primary message exists; the first
/// failing follow-up stops the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyWithThread {
    /// Where the primary message goes.
    pub target: ReplyTarget,
    /// The thread parent.
    pub primary: MessagePayload,
    /// Replies posted under the parent.
    pub thread: Vec<MessagePayload>,
}

impl ReplyWithThread {
    /// Creates a threaded reply.
    pub fn new<I, P>(target: ReplyTarget, primary: impl Into<MessagePayload>, thread: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<MessagePayload>,
    {
        Self {
            target,
            primary: primary.into(),
            thread: thread.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Action for ReplyWithThread {
    async fn execute(&self, ctx: &ActionContext) -> ActionResult<ActionOutput> {
        let channel = ctx.resolve_conversation(&self.target).await?;

        let primary = ctx
            .api()
            .post_message(&self.primary.to_post(channel.as_str(), None))
            .await
            .map_err(ActionError::PrimaryPostFailed)?;
        debug!(channel = %primary.channel, ts = %primary.ts, replies = self.thread.len(), "Posted thread parent");

        let mut replies = Vec::with_capacity(self.thread.len());
        for payload in &self.thread {
            let post = payload.to_post(channel.as_str(), Some(primary.ts.clone()));
            replies.push(ctx.api().post_message(&post).await?);
        }

        Ok(ActionOutput::Threaded { primary, replies })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quip_core::{ApiError, ApiMethod, RecordingApi};

    use super::*;

    fn target() -> ReplyTarget {
        ReplyTarget::Message {
            conversation_id: "C1".into(),
            ts: "9.0".into(),
        }
    }

    #[tokio::test]
    async fn test_replies_thread_under_primary() {
        let api = Arc::new(RecordingApi::new());
        let ctx = ActionContext::from_api(api.clone());

        let output = ReplyWithThread::new(target(), "summary", ["one", "two"])
            .execute(&ctx)
            .await
            .unwrap();

        let ActionOutput::Threaded { primary, replies } = output else {
            panic!("expected threaded output");
        };
        assert_eq!(replies.len(), 2);

        let posted = api.posted_messages();
        let texts: Vec<_> = posted.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, ["summary", "one", "two"]);
        assert_eq!(posted[0].thread_ts, None);
        assert!(posted[1..].iter().all(|p| p.thread_ts.as_deref() == Some(primary.ts.as_str())));
    }

    #[tokio::test]
    async fn test_primary_failure() {
        let api = Arc::new(RecordingApi::new().fail_on(
            ApiMethod::PostMessage,
            ApiError::platform("chat.postMessage", "channel_not_found"),
        ));
        let ctx = ActionContext::from_api(api.clone());

        let err = ReplyWithThread::new(target(), "summary", ["one"])
            .execute(&ctx)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "couldn't post first message");
        assert_eq!(api.call_count(ApiMethod::PostMessage), 1);
    }
}

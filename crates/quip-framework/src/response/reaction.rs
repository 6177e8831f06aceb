use async_trait::async_trait;
use quip_core::ReplyTarget;
use tracing::debug;

use super::{Action, ActionContext, ActionOutput};
use crate::error::{ActionError, ActionResult};

fn message_of(target: &ReplyTarget) -> ActionResult<(&str, &str)> {
    match (target.conversation_id(), target.ts()) {
        (Some(channel), Some(ts)) => Ok((channel, ts)),
        _ => match target {
            ReplyTarget::ChannelNamed(name) => Err(ActionError::NoMessageToReact(name.clone())),
            _ => Err(ActionError::NoMessageToReact(String::new())),
        },
    }
}

/// Adds reactions to a message, one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojisReaction {
    /// The message reacted to.
    pub target: ReplyTarget,
    /// Emoji names, without colons.
    pub emojis: Vec<String>,
}

impl EmojisReaction {
    /// Creates a reaction action.
    pub fn new<I, S>(target: ReplyTarget, emojis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target,
            emojis: emojis.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Action for EmojisReaction {
    async fn execute(&self, ctx: &ActionContext) -> ActionResult<ActionOutput> {
        let (channel, ts) = message_of(&self.target)?;

        for (index, emoji) in self.emojis.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(ctx.reaction_delay()).await;
            }
            ctx.api()
                .add_reaction(channel, ts, emoji)
                .await
                .map_err(|source| ActionError::Reaction {
                    emoji: emoji.clone(),
                    source,
                })?;
        }

        debug!(channel, ts, count = self.emojis.len(), "Added reactions");
        Ok(ActionOutput::Reacted(self.emojis.clone()))
    }
}

/// Spells a word with reactions, using the configured letter map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiWordReaction {
    /// The message reacted to.
    pub target: ReplyTarget,
    /// The word to spell.
    pub word: String,
}

impl EmojiWordReaction {
    /// Creates a word reaction action.
    pub fn new(target: ReplyTarget, word: impl Into<String>) -> Self {
        Self {
            target,
            word: word.into(),
        }
    }
}

#[async_trait]
impl Action for EmojiWordReaction {
    async fn execute(&self, ctx: &ActionContext) -> ActionResult<ActionOutput> {
        let letters = ctx.letters().ok_or(ActionError::MissingLetterMap)?;
        let emojis = letters.emojis_for_word(&self.word)?;
        EmojisReaction::new(self.target.clone(), emojis)
            .execute(ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use quip_core::{ApiMethod, RecordingApi};
    use tokio::time::Instant;

    use super::*;
    use crate::error::LetterMapError;
    use crate::letter_map::{EmojiLetterMap, LetterEmojis};

    fn target() -> ReplyTarget {
        ReplyTarget::Message {
            conversation_id: "C1".into(),
            ts: "5.0".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reactions_are_spaced_out() {
        let api = Arc::new(RecordingApi::new());
        let ctx = ActionContext::from_api(api.clone());

        let start = Instant::now();
        EmojisReaction::new(target(), ["one", "two", "three"])
            .execute(&ctx)
            .await
            .unwrap();

        assert_eq!(api.reactions(), ["one", "two", "three"]);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_failed_reaction_names_emoji_and_stops() {
        let api = Arc::new(RecordingApi::new().fail_reaction("bad"));
        let ctx = ActionContext::from_api(api.clone()).with_reaction_delay(Duration::ZERO);

        let err = EmojisReaction::new(target(), ["ok", "bad", "never"])
            .execute(&ctx)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "error making reaction for `bad`");
        assert_eq!(api.call_count(ApiMethod::AddReaction), 2);
    }

    #[tokio::test]
    async fn test_named_channel_has_no_message() {
        let api = Arc::new(RecordingApi::new());
        let ctx = ActionContext::from_api(api);

        let err = EmojisReaction::new(ReplyTarget::channel_named("general"), ["x"])
            .execute(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NoMessageToReact(ref name) if name == "general"));
    }

    #[tokio::test]
    async fn test_word_needs_letter_map() {
        let ctx = ActionContext::from_api(Arc::new(RecordingApi::new()));

        let err = EmojiWordReaction::new(target(), "hi")
            .execute(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::MissingLetterMap));
    }

    #[tokio::test(start_paused = true)]
    async fn test_word_is_spelled() {
        let api = Arc::new(RecordingApi::new());
        let letters = EmojiLetterMap::new([
            ("h", LetterEmojis::Flat(vec!["h".into()])),
            ("i", LetterEmojis::Flat(vec!["information_source".into()])),
        ])
        .unwrap();
        let ctx = ActionContext::from_api(api.clone()).with_letters(Arc::new(letters));

        EmojiWordReaction::new(target(), "Hi")
            .execute(&ctx)
            .await
            .unwrap();
        assert_eq!(api.reactions(), ["h", "information_source"]);

        let err = EmojiWordReaction::new(target(), "hey")
            .execute(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Letters(LetterMapError::NoEmoji('e'))));
    }
}

//! The request/response API collaborator.
//!
//! [`WebApi`] is the boundary between the framework and the platform's web
//! API. The framework only ever talks to the platform through this trait, so
//! any client (HTTP, in-memory, recording) can be plugged in.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::ApiResult;
use crate::foundation::event::MessageEventData;

// =============================================================================
// Workspace entities
// =============================================================================

/// A named channel (public or private).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel id.
    pub id: String,
    /// Channel name, without a leading `#`.
    #[serde(default)]
    pub name: String,
    /// Whether the channel is private.
    #[serde(default)]
    pub is_private: bool,
    /// Whether the channel is archived.
    #[serde(default)]
    pub is_archived: bool,
    /// Whether the bot is a member.
    #[serde(default)]
    pub is_member: bool,
}

/// A direct-message conversation between the bot and one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectConversation {
    /// Conversation id.
    pub id: String,
    /// The other participant.
    #[serde(default)]
    pub user: String,
    /// Whether the other participant has been deleted.
    #[serde(default)]
    pub is_user_deleted: bool,
}

/// A workspace member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: String,
    /// Handle / display name.
    #[serde(default)]
    pub name: String,
    /// Full name.
    #[serde(default)]
    pub real_name: Option<String>,
    /// Whether the account is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Whether the account is deactivated.
    #[serde(default)]
    pub deleted: bool,
    /// Time zone identifier.
    #[serde(default)]
    pub tz: Option<String>,
}

/// Identity of the connected bot and its workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// The bot's own user id; used for mention detection.
    pub user_id: String,
    /// The bot's handle.
    #[serde(default)]
    pub user_name: String,
    /// Workspace id.
    #[serde(default)]
    pub team_id: String,
    /// Workspace name.
    #[serde(default)]
    pub team_name: String,
    /// Workspace URL.
    #[serde(default)]
    pub url: String,
}

// =============================================================================
// Requests and responses
// =============================================================================

/// A message to post to a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMessage {
    /// Target conversation id.
    pub channel: String,
    /// Message text.
    pub text: String,
    /// Legacy attachments, passed through untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    /// Layout blocks, passed through untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
    /// Post as a reply in this thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

/// A message visible only to one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEphemeral {
    /// Conversation to show the message in.
    pub channel: String,
    /// The only user who will see it.
    pub user: String,
    /// Message text.
    pub text: String,
}

/// Result of a successful post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    /// Conversation the message landed in.
    pub channel: String,
    /// Timestamp of the new message; usable as a thread parent.
    pub ts: String,
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Cursor for the next page; `None` (or empty) on the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A single, final page.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

// =============================================================================
// WebApi
// =============================================================================

/// Request methods consumed from the platform's web API.
///
/// Every method surfaces a non-ok platform answer as an
/// [`ApiError`](crate::ApiError); callers decide whether that is fatal.
#[async_trait]
pub trait WebApi: Send + Sync {
    /// Posts a message to a conversation, optionally into a thread.
    async fn post_message(&self, message: &PostMessage) -> ApiResult<PostedMessage>;

    /// Posts a message visible only to one user.
    async fn post_ephemeral(&self, message: &PostEphemeral) -> ApiResult<()>;

    /// Adds the named reaction to a message.
    async fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> ApiResult<()>;

    /// Fetches a single historical message.
    async fn fetch_message(
        &self,
        channel: &str,
        timestamp: &str,
    ) -> ApiResult<Option<MessageEventData>>;

    /// Lists one page of named channels.
    async fn list_channels(&self, cursor: Option<&str>) -> ApiResult<Page<Channel>>;

    /// Lists one page of direct-message conversations.
    async fn list_direct_conversations(
        &self,
        cursor: Option<&str>,
    ) -> ApiResult<Page<DirectConversation>>;

    /// Lists one page of users.
    async fn list_users(&self, cursor: Option<&str>) -> ApiResult<Page<User>>;
}

/// Follows `next_cursor` until it is absent, concatenating every page.
///
/// The first error aborts the walk and is returned as-is.
///
/// ```rust,ignore
/// let api = Arc::clone(&api);
/// let users = collect_pages(|cursor| {
///     let api = Arc::clone(&api);
///     async move { api.list_users(cursor.as_deref()).await }
/// })
/// .await?;
/// ```
pub async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> ApiResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(cursor.take()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    trace!(pages, items = items.len(), "Pagination complete");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[tokio::test]
    async fn test_collect_pages_follows_cursor() {
        let mut seen = Vec::new();
        let items = collect_pages(|cursor| {
            seen.push(cursor.clone());
            async move {
                Ok(match cursor.as_deref() {
                    None => Page {
                        items: vec![1, 2],
                        next_cursor: Some("p2".into()),
                    },
                    Some("p2") => Page {
                        items: vec![3],
                        next_cursor: Some(String::new()),
                    },
                    Some(other) => panic!("unexpected cursor {other}"),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(seen, vec![None, Some("p2".to_string())]);
    }

    #[tokio::test]
    async fn test_collect_pages_aborts_on_error() {
        let result: ApiResult<Vec<u8>> = collect_pages(|cursor| async move {
            match cursor {
                None => Ok(Page {
                    items: vec![1],
                    next_cursor: Some("p2".into()),
                }),
                Some(_) => Err(ApiError::platform("users.list", "ratelimited")),
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Platform { .. })));
    }
}

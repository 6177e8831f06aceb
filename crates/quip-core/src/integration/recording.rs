//! An in-memory [`WebApi`] that records every call.
//!
//! Seeded with channels, users and message history, it answers the way the
//! platform would and keeps a log of what was asked of it. Listings are
//! paginated with a configurable page size so cursor handling is exercised.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ApiError, ApiResult};
use crate::foundation::event::MessageEventData;
use crate::integration::api::{
    Channel, DirectConversation, Page, PostEphemeral, PostMessage, PostedMessage, User, WebApi,
};

/// API methods, by their platform names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    /// `chat.postMessage`
    PostMessage,
    /// `chat.postEphemeral`
    PostEphemeral,
    /// `reactions.add`
    AddReaction,
    /// `conversations.history`
    FetchMessage,
    /// `conversations.list` (public and private channels)
    ListChannels,
    /// `conversations.list` (direct messages)
    ListDirectConversations,
    /// `users.list`
    ListUsers,
}

impl ApiMethod {
    /// Returns the platform method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostMessage => "chat.postMessage",
            Self::PostEphemeral => "chat.postEphemeral",
            Self::AddReaction => "reactions.add",
            Self::FetchMessage => "conversations.history",
            Self::ListChannels | Self::ListDirectConversations => "conversations.list",
            Self::ListUsers => "users.list",
        }
    }
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    PostMessage(PostMessage),
    PostEphemeral(PostEphemeral),
    AddReaction {
        channel: String,
        timestamp: String,
        name: String,
    },
    FetchMessage {
        channel: String,
        timestamp: String,
    },
    ListChannels {
        cursor: Option<String>,
    },
    ListDirectConversations {
        cursor: Option<String>,
    },
    ListUsers {
        cursor: Option<String>,
    },
}

impl ApiCall {
    /// The method this call went to.
    pub fn method(&self) -> ApiMethod {
        match self {
            Self::PostMessage(_) => ApiMethod::PostMessage,
            Self::PostEphemeral(_) => ApiMethod::PostEphemeral,
            Self::AddReaction { .. } => ApiMethod::AddReaction,
            Self::FetchMessage { .. } => ApiMethod::FetchMessage,
            Self::ListChannels { .. } => ApiMethod::ListChannels,
            Self::ListDirectConversations { .. } => ApiMethod::ListDirectConversations,
            Self::ListUsers { .. } => ApiMethod::ListUsers,
        }
    }
}

#[derive(Default)]
struct RecordingState {
    channels: Vec<Channel>,
    direct_conversations: Vec<DirectConversation>,
    users: Vec<User>,
    history: HashMap<(String, String), MessageEventData>,
    failures: HashMap<ApiMethod, ApiError>,
    failing_reactions: HashSet<String>,
    calls: Vec<ApiCall>,
    posted: u64,
}

/// A recording, in-memory [`WebApi`].
pub struct RecordingApi {
    page_size: usize,
    state: Mutex<RecordingState>,
}

impl Default for RecordingApi {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingApi {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self {
            page_size: 100,
            state: Mutex::new(RecordingState::default()),
        }
    }

    /// Sets how many entities each listing page holds.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Adds a named channel.
    pub fn with_channel(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.state.lock().channels.push(Channel {
            id: id.into(),
            name: name.into(),
            is_member: true,
            ..Default::default()
        });
        self
    }

    /// Adds a direct conversation with `user`.
    pub fn with_direct_conversation(self, id: impl Into<String>, user: impl Into<String>) -> Self {
        self.state
            .lock()
            .direct_conversations
            .push(DirectConversation {
                id: id.into(),
                user: user.into(),
                is_user_deleted: false,
            });
        self
    }

    /// Adds a user.
    pub fn with_user(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.state.lock().users.push(User {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        });
        self
    }

    /// Adds a historical message, retrievable with `fetch_message`.
    pub fn with_message(self, message: MessageEventData) -> Self {
        self.state
            .lock()
            .history
            .insert((message.channel.clone(), message.ts.clone()), message);
        self
    }

    /// Makes every call to `method` fail with `error`.
    pub fn fail_on(self, method: ApiMethod, error: ApiError) -> Self {
        self.state.lock().failures.insert(method, error);
        self
    }

    /// Makes adding the reaction `name` fail with `invalid_name`.
    pub fn fail_reaction(self, name: impl Into<String>) -> Self {
        self.state.lock().failing_reactions.insert(name.into());
        self
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().calls.clone()
    }

    /// Returns how many times `method` was called.
    pub fn call_count(&self, method: ApiMethod) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.method() == method)
            .count()
    }

    /// Returns every posted message, in order.
    pub fn posted_messages(&self) -> Vec<PostMessage> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::PostMessage(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns every ephemeral message, in order.
    pub fn ephemeral_messages(&self) -> Vec<PostEphemeral> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::PostEphemeral(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the names of every reaction added, in order.
    pub fn reactions(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::AddReaction { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forgets recorded calls; seeded data is kept.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: ApiCall) -> ApiResult<()> {
        let mut state = self.state.lock();
        let method = call.method();
        state.calls.push(call);
        match state.failures.get(&method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn page<T: Clone>(&self, items: &[T], cursor: Option<&str>) -> ApiResult<Page<T>> {
        let start = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| ApiError::platform("conversations.list", "invalid_cursor"))?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let next_cursor = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: items.get(start..end).unwrap_or_default().to_vec(),
            next_cursor,
        })
    }
}

#[async_trait]
impl WebApi for RecordingApi {
    async fn post_message(&self, message: &PostMessage) -> ApiResult<PostedMessage> {
        self.record(ApiCall::PostMessage(message.clone()))?;
        let mut state = self.state.lock();
        state.posted += 1;
        Ok(PostedMessage {
            channel: message.channel.clone(),
            ts: format!("1700000000.{:06}", state.posted),
        })
    }

    async fn post_ephemeral(&self, message: &PostEphemeral) -> ApiResult<()> {
        self.record(ApiCall::PostEphemeral(message.clone()))
    }

    async fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> ApiResult<()> {
        self.record(ApiCall::AddReaction {
            channel: channel.to_string(),
            timestamp: timestamp.to_string(),
            name: name.to_string(),
        })?;
        if self.state.lock().failing_reactions.contains(name) {
            return Err(ApiError::platform(
                ApiMethod::AddReaction.as_str(),
                "invalid_name",
            ));
        }
        Ok(())
    }

    async fn fetch_message(
        &self,
        channel: &str,
        timestamp: &str,
    ) -> ApiResult<Option<MessageEventData>> {
        self.record(ApiCall::FetchMessage {
            channel: channel.to_string(),
            timestamp: timestamp.to_string(),
        })?;
        let state = self.state.lock();
        Ok(state
            .history
            .get(&(channel.to_string(), timestamp.to_string()))
            .cloned())
    }

    async fn list_channels(&self, cursor: Option<&str>) -> ApiResult<Page<Channel>> {
        self.record(ApiCall::ListChannels {
            cursor: cursor.map(str::to_string),
        })?;
        let channels = self.state.lock().channels.clone();
        self.page(&channels, cursor)
    }

    async fn list_direct_conversations(
        &self,
        cursor: Option<&str>,
    ) -> ApiResult<Page<DirectConversation>> {
        self.record(ApiCall::ListDirectConversations {
            cursor: cursor.map(str::to_string),
        })?;
        let conversations = self.state.lock().direct_conversations.clone();
        self.page(&conversations, cursor)
    }

    async fn list_users(&self, cursor: Option<&str>) -> ApiResult<Page<User>> {
        self.record(ApiCall::ListUsers {
            cursor: cursor.map(str::to_string),
        })?;
        let users = self.state.lock().users.clone();
        self.page(&users, cursor)
    }
}

//! Cached lookups over workspace entities.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::directory::table::{CachedRemoteTable, RefreshPolicy};
use crate::error::ApiResult;
use crate::integration::api::{Channel, DirectConversation, User, WebApi, collect_pages};

/// Cache settings shared by every directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryOptions {
    /// How long a fetched listing stays fresh.
    pub ttl: Duration,
    /// What to do once it has expired.
    pub policy: RefreshPolicy,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            policy: RefreshPolicy::AwaitFresh,
        }
    }
}

/// Channels, direct conversations and users, each behind its own
/// [`CachedRemoteTable`].
///
/// Nothing is fetched until the first lookup or an explicit
/// [`prime`](Self::prime).
#[derive(Debug, Clone)]
pub struct WorkspaceDirectory {
    channels: CachedRemoteTable<Vec<Channel>>,
    direct_conversations: CachedRemoteTable<Vec<DirectConversation>>,
    users: CachedRemoteTable<Vec<User>>,
}

impl WorkspaceDirectory {
    /// Assembles a directory from existing tables.
    pub fn new(
        channels: CachedRemoteTable<Vec<Channel>>,
        direct_conversations: CachedRemoteTable<Vec<DirectConversation>>,
        users: CachedRemoteTable<Vec<User>>,
    ) -> Self {
        Self {
            channels,
            direct_conversations,
            users,
        }
    }

    /// Builds a directory whose tables page through `api`.
    pub fn from_api(api: Arc<dyn WebApi>, options: DirectoryOptions) -> Self {
        let DirectoryOptions { ttl, policy } = options;

        let channels = {
            let api = Arc::clone(&api);
            CachedRemoteTable::new("channels", ttl, policy, move || {
                let api = Arc::clone(&api);
                async move {
                    collect_pages(|cursor| {
                        let api = Arc::clone(&api);
                        async move { api.list_channels(cursor.as_deref()).await }
                    })
                    .await
                }
            })
        };

        let direct_conversations = {
            let api = Arc::clone(&api);
            CachedRemoteTable::new("direct_conversations", ttl, policy, move || {
                let api = Arc::clone(&api);
                async move {
                    collect_pages(|cursor| {
                        let api = Arc::clone(&api);
                        async move { api.list_direct_conversations(cursor.as_deref()).await }
                    })
                    .await
                }
            })
        };

        let users = CachedRemoteTable::new("users", ttl, policy, move || {
            let api = Arc::clone(&api);
            async move {
                collect_pages(|cursor| {
                    let api = Arc::clone(&api);
                    async move { api.list_users(cursor.as_deref()).await }
                })
                .await
            }
        });

        Self::new(channels, direct_conversations, users)
    }

    /// Fetches every table concurrently. Any failure is returned.
    pub async fn prime(&self) -> ApiResult<()> {
        let (channels, conversations, users) = futures::try_join!(
            self.channels.get(),
            self.direct_conversations.get(),
            self.users.get()
        )?;
        info!(
            channels = channels.len(),
            direct_conversations = conversations.len(),
            users = users.len(),
            "Workspace directory primed"
        );
        Ok(())
    }

    /// Drops every cached listing.
    pub fn invalidate_all(&self) {
        self.channels.invalidate();
        self.direct_conversations.invalidate();
        self.users.invalidate();
    }

    /// Re-fetches every table now.
    pub async fn refresh_all(&self) -> ApiResult<()> {
        futures::try_join!(
            self.channels.refresh(),
            self.direct_conversations.refresh(),
            self.users.refresh()
        )?;
        Ok(())
    }

    // ---- channels ----

    /// Returns every channel.
    pub async fn channels(&self) -> ApiResult<Arc<Vec<Channel>>> {
        self.channels.get().await
    }

    /// Looks up a channel by id.
    pub async fn channel(&self, id: &str) -> ApiResult<Option<Channel>> {
        let channels = self.channels.get().await?;
        Ok(channels.iter().find(|c| c.id == id).cloned())
    }

    /// Looks up a channel by name; a leading `#` is ignored.
    pub async fn channel_named(&self, name: &str) -> ApiResult<Option<Channel>> {
        let name = name.trim_start_matches('#');
        let channels = self.channels.get().await?;
        Ok(channels.iter().find(|c| c.name == name).cloned())
    }

    // ---- direct conversations ----

    /// Returns every direct conversation.
    pub async fn direct_conversations(&self) -> ApiResult<Arc<Vec<DirectConversation>>> {
        self.direct_conversations.get().await
    }

    /// Looks up a direct conversation by id.
    pub async fn direct_conversation(&self, id: &str) -> ApiResult<Option<DirectConversation>> {
        let conversations = self.direct_conversations.get().await?;
        Ok(conversations.iter().find(|c| c.id == id).cloned())
    }

    // ---- users ----

    /// Returns every user.
    pub async fn users(&self) -> ApiResult<Arc<Vec<User>>> {
        self.users.get().await
    }

    /// Looks up a user by id.
    pub async fn user(&self, id: &str) -> ApiResult<Option<User>> {
        let users = self.users.get().await?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    /// Looks up a user by handle; a leading `@` is ignored.
    pub async fn user_named(&self, name: &str) -> ApiResult<Option<User>> {
        let name = name.trim_start_matches('@');
        let users = self.users.get().await?;
        Ok(users.iter().find(|u| u.name == name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::integration::recording::{ApiMethod, RecordingApi};

    fn directory(api: RecordingApi) -> (WorkspaceDirectory, Arc<RecordingApi>) {
        let api = Arc::new(api);
        let directory = WorkspaceDirectory::from_api(api.clone(), DirectoryOptions::default());
        (directory, api)
    }

    #[tokio::test]
    async fn test_lookups_by_id_and_name() {
        let (directory, _) = directory(
            RecordingApi::new()
                .with_channel("C1", "general")
                .with_direct_conversation("D1", "U1")
                .with_user("U1", "ann"),
        );

        assert_eq!(directory.channel("C1").await.unwrap().unwrap().name, "general");
        assert_eq!(directory.channel_named("#general").await.unwrap().unwrap().id, "C1");
        assert!(directory.channel_named("random").await.unwrap().is_none());
        assert_eq!(directory.direct_conversation("D1").await.unwrap().unwrap().user, "U1");
        assert_eq!(directory.user_named("@ann").await.unwrap().unwrap().id, "U1");
    }

    #[tokio::test]
    async fn test_prime_fetches_each_table_once() {
        let (directory, api) = directory(
            RecordingApi::new()
                .with_page_size(1)
                .with_user("U1", "ann")
                .with_user("U2", "bob"),
        );

        directory.prime().await.unwrap();
        directory.user("U2").await.unwrap();
        directory.channel("C1").await.unwrap();

        assert_eq!(api.call_count(ApiMethod::ListUsers), 2);
        assert_eq!(api.call_count(ApiMethod::ListChannels), 1);
        assert_eq!(api.call_count(ApiMethod::ListDirectConversations), 1);
    }

    #[tokio::test]
    async fn test_prime_fails_on_api_error() {
        let (directory, _) = directory(
            RecordingApi::new()
                .fail_on(ApiMethod::ListUsers, ApiError::platform("users.list", "invalid_auth")),
        );

        assert!(directory.prime().await.is_err());
    }

    #[tokio::test]
    async fn test_invalidate_all_refetches() {
        let (directory, api) = directory(RecordingApi::new().with_user("U1", "ann"));

        directory.prime().await.unwrap();
        directory.invalidate_all();
        directory.user("U1").await.unwrap();

        assert_eq!(api.call_count(ApiMethod::ListUsers), 2);
    }
}

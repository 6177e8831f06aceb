//! # Quip Core
//!
//! Foundation types for the Quip chat-bot framework.
//!
//! ## Layers
//!
//! ### Foundation
//!
//! Inbound events and their normalized views:
//! - **Raw events**: [`InboundEvent`] as decoded from the event stream
//! - **Messages**: [`InboundMessage`] with sender, channel and DM context resolved
//! - **Reactions**: [`ReactionEvent`] with the reacted-to message fetched
//! - **Text helpers**: [`normalize_emoji`], [`extract_links`]
//!
//! ### Integration
//!
//! The two platform collaborators:
//! - [`WebApi`]: posting, reacting, fetching and paginated listings
//! - [`EventSource`]: the inbound event stream
//! - [`RecordingApi`]: an in-memory `WebApi` for tests
//!
//! ### Primitives and directory
//!
//! - [`KeyedThrottle`]: per-key cooldown gate
//! - [`BoundedRandomPicker`] / [`RoundRobinPicker`]: varied output without repeats
//! - [`CachedRemoteTable`]: single-flight TTL cache
//! - [`WorkspaceDirectory`]: cached channels, direct conversations and users
//!
//! ## Data flow
//!
//! ```text
//! ┌─────────────┐   InboundEvent   ┌────────────────┐   lookups   ┌────────────────────┐
//! │ EventSource │─────────────────▶│ InboundMessage │◀────────────│ WorkspaceDirectory │
//! └─────────────┘                  │ ReactionEvent  │             └─────────┬──────────┘
//!                                  └────────────────┘                       │ paginated
//!                                                                           ▼ listings
//!                                                                     ┌──────────┐
//!                                                                     │  WebApi  │
//!                                                                     └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quip_core::{DirectoryOptions, RecordingApi, WorkspaceDirectory};
//!
//! # async fn run() -> quip_core::ApiResult<()> {
//! let api = Arc::new(RecordingApi::new().with_channel("C1", "general"));
//! let directory = WorkspaceDirectory::from_api(api, DirectoryOptions::default());
//!
//! directory.prime().await?;
//! let general = directory.channel_named("#general").await?;
//! assert_eq!(general.map(|c| c.id), Some("C1".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod directory;
pub mod error;
pub mod foundation;
pub mod integration;
pub mod primitives;

pub use error::{ApiError, ApiResult, TransportError, TransportResult};

// Re-export foundation types
pub use foundation::{
    Attachment, InboundEvent, InboundMessage, Link, MessageEventData, ReactionAddedData,
    ReactionEvent, ReactionItem, ReplyTarget, extract_links, normalize_emoji,
};

// Re-export integration types
pub use integration::{
    ApiCall, ApiMethod, Channel, ChannelEventSource, DirectConversation, EventSource, Page,
    PostEphemeral, PostMessage, PostedMessage, RecordingApi, SessionInfo, User, WebApi,
    collect_pages,
};

// Re-export primitives and directory
pub use directory::{CachedRemoteTable, DirectoryOptions, RefreshPolicy, WorkspaceDirectory};
pub use primitives::{
    AutoReset, BoundedRandomPicker, DEFAULT_THROTTLE_TTL, KeyedThrottle, RoundRobinPicker,
};

/// Boxed future alias used by callback-style APIs.
pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::{InboundEvent, InboundMessage, ReactionEvent, ReplyTarget};
    pub use super::integration::{EventSource, WebApi};
    pub use super::{ApiError, ApiResult, KeyedThrottle, WorkspaceDirectory};
}

//! Foundation layer - inbound events and their normalized views.
//!
//! - [`event`]: raw payloads from the event stream
//! - [`message`] / [`reaction`]: read-only views with directory context resolved
//! - [`emoji`] / [`links`]: text helpers shared by both

pub mod emoji;
pub mod event;
pub mod links;
pub mod message;
pub mod reaction;

pub use emoji::normalize_emoji;
pub use event::{
    Attachment, InboundEvent, MessageEventData, ReactionAddedData, ReactionItem,
};
pub use links::{Link, extract_links};
pub use message::{InboundMessage, ReplyTarget};
pub use reaction::ReactionEvent;

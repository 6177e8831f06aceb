//! Integration layer - the platform collaborators.
//!
//! - [`WebApi`]: request/response calls (posting, reacting, listing)
//! - [`EventSource`]: the inbound event stream
//! - [`RecordingApi`]: an in-memory `WebApi` for tests and dry runs

pub mod api;
pub mod recording;
pub mod transport;

pub use api::{
    Channel, DirectConversation, Page, PostEphemeral, PostMessage, PostedMessage, SessionInfo,
    User, WebApi, collect_pages,
};
pub use recording::{ApiCall, ApiMethod, RecordingApi};
pub use transport::{ChannelEventSource, EventSource};

//! The event-stream collaborator.
//!
//! An [`EventSource`] opens a session with the platform and yields inbound
//! events one at a time. The runtime owns the receive loop; sources only
//! decode and acknowledge.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::error::{TransportError, TransportResult};
use crate::foundation::event::InboundEvent;
use crate::integration::api::SessionInfo;

/// A stream of inbound events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Opens the session and reports who the bot is.
    async fn start_session(&self) -> TransportResult<SessionInfo>;

    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the stream has ended for good.
    async fn next_event(&self) -> TransportResult<Option<InboundEvent>>;

    /// Closes the session. The default does nothing.
    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}

/// An in-process event source fed through a channel.
///
/// Useful for tests and for driving a bot from something other than the
/// platform's socket. The stream ends when every sender is dropped.
pub struct ChannelEventSource {
    session: SessionInfo,
    receiver: Mutex<mpsc::Receiver<InboundEvent>>,
    started: AtomicBool,
}

impl ChannelEventSource {
    /// Creates a source announcing `session`, and the sender that feeds it.
    pub fn new(session: SessionInfo, buffer: usize) -> (Self, mpsc::Sender<InboundEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let source = Self {
            session,
            receiver: Mutex::new(rx),
            started: AtomicBool::new(false),
        };
        (source, tx)
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn start_session(&self) -> TransportResult<SessionInfo> {
        self.started.store(true, Ordering::SeqCst);
        Ok(self.session.clone())
    }

    async fn next_event(&self) -> TransportResult<Option<InboundEvent>> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(TransportError::NotStarted);
        }
        Ok(self.receiver.lock().await.recv().await)
    }

    async fn close(&self) -> TransportResult<()> {
        self.receiver.lock().await.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_requires_start() {
        let (source, _tx) = ChannelEventSource::new(SessionInfo::default(), 4);
        assert!(matches!(
            source.next_event().await,
            Err(TransportError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let session = SessionInfo {
            user_id: "UBOT".into(),
            ..Default::default()
        };
        let (source, tx) = ChannelEventSource::new(session, 4);

        let info = source.start_session().await.unwrap();
        assert_eq!(info.user_id, "UBOT");

        tx.send(InboundEvent::Unsupported).await.unwrap();
        drop(tx);

        assert!(matches!(
            source.next_event().await.unwrap(),
            Some(InboundEvent::Unsupported)
        ));
        assert!(source.next_event().await.unwrap().is_none());
    }
}

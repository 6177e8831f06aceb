//! Dispatch as a tower service.
//!
//! [`DispatchService`] turns a raw [`InboundEvent`] into a normalized message
//! or reaction and runs the [`HandlerRegistry`] on it. Event filtering is an
//! ordinary tower filter stacked on top:
//!
//! ```rust,ignore
//! use tower::{ServiceBuilder, ServiceExt};
//!
//! let service = ServiceBuilder::new()
//!     .filter(EventFilter::new(bot_user_id.clone(), DEFAULT_IGNORED_SUBTYPES))
//!     .service(DispatchService::new(registry, actions, bot_user_id));
//!
//! match service.oneshot(event).await {
//!     Ok(report) => { /* ... */ }
//!     Err(err) if err.is::<EventSkipped>() => { /* filtered out */ }
//!     Err(err) => { /* normalization failed */ }
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::task::{Context, Poll};

use quip_core::{BoxFuture, InboundEvent, InboundMessage, ReactionEvent};
use tower::filter::Predicate;
use tower::{BoxError, Service};
use tracing::trace;

use crate::error::EventSkipped;
use crate::registry::{DispatchReport, HandlerRegistry};
use crate::response::ActionContext;

/// Message subtypes that are never dispatched.
pub const DEFAULT_IGNORED_SUBTYPES: &[&str] = &[
    "bot_message",
    "message_deleted",
    "message_replied",
    "message_changed",
];

// ============================================================================
// EventFilter
// ============================================================================

/// Rejects events the bot must not respond to.
///
/// Skipped: unsupported event types, messages with an ignored subtype, and
/// messages or reactions from the bot itself. Rejections are
/// [`EventSkipped`] errors.
#[derive(Debug, Clone)]
pub struct EventFilter {
    bot_user_id: Arc<str>,
    ignored_subtypes: Arc<HashSet<String>>,
}

impl EventFilter {
    /// Creates a filter for the bot with the given user id.
    pub fn new<I, S>(bot_user_id: impl Into<Arc<str>>, ignored_subtypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bot_user_id: bot_user_id.into(),
            ignored_subtypes: Arc::new(ignored_subtypes.into_iter().map(Into::into).collect()),
        }
    }

    fn skip_reason(&self, event: &InboundEvent) -> Option<&'static str> {
        match event {
            InboundEvent::Message(data) => {
                if data
                    .subtype
                    .as_deref()
                    .is_some_and(|subtype| self.ignored_subtypes.contains(subtype))
                {
                    Some("ignored subtype")
                } else if data.user.as_deref() == Some(&*self.bot_user_id) {
                    Some("own message")
                } else {
                    None
                }
            }
            InboundEvent::ReactionAdded(data) => {
                (data.user == *self.bot_user_id).then_some("own reaction")
            }
            InboundEvent::Unsupported => Some("unsupported event"),
        }
    }
}

impl Predicate<InboundEvent> for EventFilter {
    type Request = InboundEvent;

    fn check(&mut self, event: InboundEvent) -> Result<InboundEvent, BoxError> {
        match self.skip_reason(&event) {
            Some(reason) => {
                trace!(event = event.event_name(), reason, "Event skipped");
                Err(Box::new(EventSkipped { reason }))
            }
            None => Ok(event),
        }
    }
}

// ============================================================================
// DispatchService
// ============================================================================

/// A tower [`Service`] that normalizes an event and dispatches it.
///
/// Fails only when normalization does (a directory lookup or the fetch of a
/// reacted-to message); handler and action failures are isolated and end up
/// in the [`DispatchReport`].
#[derive(Debug, Clone)]
pub struct DispatchService {
    registry: Arc<HandlerRegistry>,
    actions: ActionContext,
    bot_user_id: Arc<str>,
}

impl DispatchService {
    /// Creates the service.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        actions: ActionContext,
        bot_user_id: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            registry,
            actions,
            bot_user_id: bot_user_id.into(),
        }
    }

    /// The registry dispatched to.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }
}

impl Service<InboundEvent> for DispatchService {
    type Response = DispatchReport;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<DispatchReport, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: InboundEvent) -> Self::Future {
        let registry = Arc::clone(&self.registry);
        let actions = self.actions.clone();
        let bot_user_id = Arc::clone(&self.bot_user_id);

        Box::pin(async move {
            match event {
                InboundEvent::Message(data) => {
                    let message =
                        InboundMessage::build(data, &bot_user_id, actions.directory()).await?;
                    Ok(registry.dispatch_message(Arc::new(message), &actions).await)
                }
                InboundEvent::ReactionAdded(data) => {
                    let reaction = ReactionEvent::build(
                        data,
                        &bot_user_id,
                        actions.directory(),
                        actions.api().as_ref(),
                    )
                    .await?;
                    Ok(registry.dispatch_reaction(Arc::new(reaction), &actions).await)
                }
                InboundEvent::Unsupported => Err(Box::new(EventSkipped {
                    reason: "unsupported event",
                }) as BoxError),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use quip_core::{ApiError, ApiMethod, RecordingApi};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use tower::{ServiceBuilder, ServiceExt};

    use super::*;
    use crate::matcher_builders::{all, directed_at_bot};

    fn event(value: serde_json::Value) -> InboundEvent {
        InboundEvent::from_value(value).unwrap()
    }

    fn registry() -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        registry
            .register_primary(directed_at_bot().contains(["hi"]), || async { "hi there" })
            .register_reaction("eyes", all(), || async { "seen" });
        Arc::new(registry)
    }

    fn api() -> Arc<RecordingApi> {
        Arc::new(
            RecordingApi::new()
                .with_direct_conversation("D1", "U1")
                .with_channel("C1", "general")
                .with_user("U1", "ada"),
        )
    }

    #[test]
    fn test_filter_rejects_ignored_events() {
        let mut filter = EventFilter::new("UBOT", DEFAULT_IGNORED_SUBTYPES.iter().copied());

        let skipped = [
            json!({ "type": "message", "ts": "1", "channel": "C1", "subtype": "message_changed" }),
            json!({ "type": "message", "ts": "1", "channel": "C1", "user": "UBOT", "text": "me" }),
            json!({ "type": "reaction_added", "reaction": "x", "user": "UBOT", "event_ts": "1",
                    "item": { "type": "message", "channel": "C1", "ts": "1" } }),
            json!({ "type": "team_join" }),
        ];
        for value in skipped {
            let err = assert_err!(filter.check(event(value)));
            assert!(err.is::<EventSkipped>());
        }

        let kept = json!({ "type": "message", "ts": "1", "channel": "C1", "user": "U1",
                           "subtype": "thread_broadcast" });
        assert_ok!(filter.check(event(kept)));
    }

    #[tokio::test]
    async fn test_service_dispatches_direct_message() {
        let api = api();
        let mut service =
            DispatchService::new(registry(), ActionContext::from_api(api.clone()), "UBOT");

        let ready = assert_ok!(service.ready().await);
        let report = assert_ok!(
            ready
                .call(event(json!({
                    "type": "message", "ts": "5.0", "channel": "D1", "user": "U1", "text": "hi"
                })))
                .await
        );

        assert_eq!(report.matched, 1);
        assert_eq!(api.posted_messages()[0].channel, "D1");
    }

    #[tokio::test]
    async fn test_filtered_stack_skips_own_message() {
        let api = api();
        let service = ServiceBuilder::new()
            .filter(EventFilter::new("UBOT", DEFAULT_IGNORED_SUBTYPES.iter().copied()))
            .service(DispatchService::new(
                registry(),
                ActionContext::from_api(api.clone()),
                "UBOT",
            ));

        let err = service
            .oneshot(event(json!({
                "type": "message", "ts": "5.0", "channel": "D1", "user": "UBOT", "text": "hi"
            })))
            .await
            .unwrap_err();

        assert!(err.is::<EventSkipped>());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reaction_fetches_target() {
        let api = Arc::new(
            RecordingApi::new()
                .with_channel("C1", "general")
                .with_message(quip_core::MessageEventData {
                    ts: "7.0".into(),
                    text: Some("ship it".into()),
                    user: Some("U1".into()),
                    channel: "C1".into(),
                    ..Default::default()
                }),
        );
        let service = DispatchService::new(registry(), ActionContext::from_api(api.clone()), "UBOT");

        let report = service
            .oneshot(event(json!({
                "type": "reaction_added", "reaction": "eyes", "user": "U2", "event_ts": "8.0",
                "item": { "type": "message", "channel": "C1", "ts": "7.0" }
            })))
            .await
            .unwrap();

        assert_eq!(report.matched, 1);
        assert_eq!(api.posted_messages()[0].text, "seen");
        assert_eq!(api.call_count(ApiMethod::FetchMessage), 1);
    }

    #[tokio::test]
    async fn test_normalization_failure_is_an_error() {
        let api = Arc::new(RecordingApi::new().fail_on(
            ApiMethod::ListUsers,
            ApiError::platform("users.list", "ratelimited"),
        ));
        let service = DispatchService::new(registry(), ActionContext::from_api(api), "UBOT");

        let err = service
            .oneshot(event(json!({
                "type": "message", "ts": "5.0", "channel": "D1", "user": "U1", "text": "hi"
            })))
            .await
            .unwrap_err();

        assert!(err.is::<ApiError>());
    }
}

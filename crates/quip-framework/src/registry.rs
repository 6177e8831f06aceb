//! The handler registry and its dispatch algorithm.
//!
//! Three ordered, append-only lists of rules:
//!
//! - **primary**: every matching rule fires, in registration order.
//! - **fallthrough**: consulted only when no primary rule matched.
//! - **reaction**: rules keyed by an emoji pattern, matched against the
//!   message the reaction was added to.
//!
//! Matching is synchronous and ordered. Matched handlers then run
//! concurrently, but their results are collected in registration order and
//! the resulting actions are executed one at a time, in that order.
//!
//! A handler that fails (or panics) or an action that fails never affects its
//! siblings: the failure is shown to the user as an ephemeral message and
//! recorded in the [`DispatchReport`].

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use quip_core::{InboundMessage, ReactionEvent};
use regex::Regex;
use tracing::{Instrument, debug, debug_span, warn};

use crate::error::ResponseError;
use crate::extractor::HandlerContext;
use crate::handler::{BoxedHandler, Handler, HandlerOutput, into_handler};
use crate::matcher::Matcher;
use crate::outcome::Extracted;
use crate::response::{Action, ActionContext, EphemeralReply, OutboundAction};

// ============================================================================
// ReactionPattern
// ============================================================================

/// Which emoji a reaction rule responds to.
#[derive(Debug, Clone)]
pub enum ReactionPattern {
    /// Exactly this emoji name.
    Exact(String),
    /// Any of these emoji names.
    AnyOf(Vec<String>),
    /// Emoji names matching this pattern; its captures are passed to the
    /// handler ahead of the matcher's values.
    Regex(Regex),
}

impl ReactionPattern {
    /// Tests an emoji name; on a match returns the values it contributes.
    pub fn matches(&self, emoji: &str) -> Option<Vec<Extracted>> {
        match self {
            Self::Exact(name) => (name == emoji).then(Vec::new),
            Self::AnyOf(names) => names.iter().any(|name| name == emoji).then(Vec::new),
            Self::Regex(regex) => regex.captures(emoji).map(|caps| {
                let groups = caps
                    .iter()
                    .map(|group| group.map(|m| m.as_str().to_string()))
                    .collect();
                vec![Extracted::Captures(groups)]
            }),
        }
    }
}

impl From<&str> for ReactionPattern {
    fn from(name: &str) -> Self {
        Self::Exact(name.to_string())
    }
}

impl From<String> for ReactionPattern {
    fn from(name: String) -> Self {
        Self::Exact(name)
    }
}

impl From<Vec<String>> for ReactionPattern {
    fn from(names: Vec<String>) -> Self {
        Self::AnyOf(names)
    }
}

impl From<Vec<&str>> for ReactionPattern {
    fn from(names: Vec<&str>) -> Self {
        Self::AnyOf(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ReactionPattern {
    fn from(names: [&str; N]) -> Self {
        Self::AnyOf(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Regex> for ReactionPattern {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

// ============================================================================
// DispatchReport
// ============================================================================

/// Where in a dispatch a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// A handler returned an error or panicked.
    Handler,
    /// An action failed to execute.
    Action,
    /// Telling the user about a failure failed too.
    Notify,
}

/// One isolated failure during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    /// Where it happened.
    pub stage: FailureStage,
    /// The error, rendered.
    pub message: String,
}

/// What a dispatch did.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// How many rules matched and had their handler run.
    pub matched: usize,
    /// Whether the fallthrough rules were consulted.
    pub fallthrough: bool,
    /// Every action executed, in order, including ephemeral replies for
    /// failed handlers.
    pub actions: Vec<OutboundAction>,
    /// Failures, in the order they happened.
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    /// Whether no rule matched.
    pub fn is_unmatched(&self) -> bool {
        self.matched == 0
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

#[derive(Clone)]
struct Route {
    matcher: Matcher,
    handler: BoxedHandler,
}

#[derive(Clone)]
struct ReactionRoute {
    pattern: ReactionPattern,
    route: Route,
}

struct Invocation {
    rule: String,
    handler: BoxedHandler,
    ctx: HandlerContext,
}

/// Where failures of one dispatch are reported.
struct Audience {
    conversation_id: String,
    user: Option<String>,
}

/// Ordered rule lists and the dispatch algorithm.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    primary: Vec<Route>,
    fallthrough: Vec<Route>,
    reactions: Vec<ReactionRoute>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a primary rule.
    pub fn register_primary<H, T>(&mut self, matcher: Matcher, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.primary.push(Route {
            matcher,
            handler: into_handler(handler),
        });
        self
    }

    /// Adds a rule consulted only when no primary rule matched.
    pub fn register_fallthrough<H, T>(&mut self, matcher: Matcher, handler: H) -> &mut Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.fallthrough.push(Route {
            matcher,
            handler: into_handler(handler),
        });
        self
    }

    /// Adds a reaction rule.
    pub fn register_reaction<P, H, T>(&mut self, pattern: P, matcher: Matcher, handler: H) -> &mut Self
    where
        P: Into<ReactionPattern>,
        H: Handler<T>,
        T: 'static,
    {
        self.reactions.push(ReactionRoute {
            pattern: pattern.into(),
            route: Route {
                matcher,
                handler: into_handler(handler),
            },
        });
        self
    }

    /// Number of primary, fallthrough and reaction rules.
    pub fn len(&self) -> (usize, usize, usize) {
        (self.primary.len(), self.fallthrough.len(), self.reactions.len())
    }

    /// Whether no rule is registered.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.fallthrough.is_empty() && self.reactions.is_empty()
    }

    /// Runs the message rules against a message and executes their actions.
    pub async fn dispatch_message(
        &self,
        message: Arc<InboundMessage>,
        ctx: &ActionContext,
    ) -> DispatchReport {
        let span = debug_span!(
            "dispatch",
            event = "message",
            conversation = %message.conversation_id(),
            ts = %message.ts(),
        );

        async move {
            let mut invocations = Self::match_routes(&self.primary, &message, ctx);
            let fallthrough = invocations.is_empty();
            if fallthrough {
                invocations = Self::match_routes(&self.fallthrough, &message, ctx);
            }

            let audience = Audience {
                conversation_id: message.conversation_id().to_string(),
                user: message.sender_id().map(str::to_string),
            };

            let mut report = DispatchReport {
                matched: invocations.len(),
                fallthrough,
                ..Default::default()
            };
            Self::run(invocations, &audience, ctx, &mut report).await;
            report
        }
        .instrument(span)
        .await
    }

    /// Runs the reaction rules against a reaction and executes their actions.
    ///
    /// Does nothing when the message reacted to could not be resolved.
    /// Failures are reported to the author of that message.
    pub async fn dispatch_reaction(
        &self,
        reaction: Arc<ReactionEvent>,
        ctx: &ActionContext,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(target) = reaction.target_message().cloned() else {
            debug!(emoji = reaction.emoji_name(), "Reaction target unresolved, skipping");
            return report;
        };

        let span = debug_span!(
            "dispatch",
            event = "reaction_added",
            emoji = %reaction.emoji_name(),
            conversation = %target.conversation_id(),
        );

        async move {
            let invocations: Vec<_> = self
                .reactions
                .iter()
                .filter_map(|entry| {
                    let mut extracted = entry.pattern.matches(reaction.emoji_name())?;
                    let outcome = entry.route.matcher.evaluate(&target);
                    if !outcome.matched {
                        return None;
                    }
                    extracted.extend(outcome.extracted);
                    Some(Invocation {
                        rule: rule_name(&entry.route.matcher),
                        handler: Arc::clone(&entry.route.handler),
                        ctx: HandlerContext::for_reaction(
                            Arc::clone(&target),
                            Arc::clone(&reaction),
                            extracted,
                            ctx.clone(),
                        ),
                    })
                })
                .collect();

            let audience = Audience {
                conversation_id: target.conversation_id().to_string(),
                user: target.sender_id().map(str::to_string),
            };

            report.matched = invocations.len();
            Self::run(invocations, &audience, ctx, &mut report).await;
            report
        }
        .instrument(span)
        .await
    }

    fn match_routes(
        routes: &[Route],
        message: &Arc<InboundMessage>,
        ctx: &ActionContext,
    ) -> Vec<Invocation> {
        routes
            .iter()
            .filter_map(|route| {
                let outcome = route.matcher.evaluate(message);
                outcome.matched.then(|| Invocation {
                    rule: rule_name(&route.matcher),
                    handler: Arc::clone(&route.handler),
                    ctx: HandlerContext::for_message(
                        Arc::clone(message),
                        outcome.extracted,
                        ctx.clone(),
                    ),
                })
            })
            .collect()
    }

    async fn run(
        invocations: Vec<Invocation>,
        audience: &Audience,
        ctx: &ActionContext,
        report: &mut DispatchReport,
    ) {
        let rules: Vec<String> = invocations.iter().map(|inv| inv.rule.clone()).collect();
        let outputs = join_all(invocations.into_iter().map(invoke)).await;

        let mut actions = Vec::new();
        for (rule, output) in rules.into_iter().zip(outputs) {
            match output {
                Ok(produced) => {
                    debug!(rule = %rule, actions = produced.len(), "Handler finished");
                    actions.extend(produced);
                }
                Err(err) => {
                    warn!(rule = %rule, error = %err, "Handler failed");
                    report.failures.push(DispatchFailure {
                        stage: FailureStage::Handler,
                        message: err.to_string(),
                    });
                    if let Some(reply) = audience.ephemeral(err.to_user_text()) {
                        actions.push(OutboundAction::Ephemeral(reply));
                    }
                }
            }
        }

        for action in actions {
            if let Err(err) = action.execute(ctx).await {
                warn!(action = action.kind(), error = %err, "Action failed");
                report.failures.push(DispatchFailure {
                    stage: FailureStage::Action,
                    message: err.to_string(),
                });
                Self::notify(audience, ResponseError::from(err), ctx, report).await;
            }
            report.actions.push(action);
        }
    }

    async fn notify(
        audience: &Audience,
        err: ResponseError,
        ctx: &ActionContext,
        report: &mut DispatchReport,
    ) {
        let Some(reply) = audience.ephemeral(err.to_user_text()) else {
            return;
        };
        if let Err(notify_err) = reply.execute(ctx).await {
            warn!(error = %notify_err, "Could not report failure to user");
            report.failures.push(DispatchFailure {
                stage: FailureStage::Notify,
                message: notify_err.to_string(),
            });
        }
    }
}

impl Audience {
    fn ephemeral(&self, text: String) -> Option<EphemeralReply> {
        let user = self.user.clone()?;
        Some(EphemeralReply {
            conversation_id: self.conversation_id.clone(),
            user,
            text,
        })
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("primary", &self.primary.len())
            .field("fallthrough", &self.fallthrough.len())
            .field("reactions", &self.reactions.len())
            .finish()
    }
}

fn rule_name(matcher: &Matcher) -> String {
    matcher.get_name().unwrap_or("unnamed").to_string()
}

async fn invoke(invocation: Invocation) -> HandlerOutput {
    let Invocation { handler, ctx, .. } = invocation;
    AssertUnwindSafe(async move { handler.call(ctx).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ResponseError::Panicked(panic_message(panic.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

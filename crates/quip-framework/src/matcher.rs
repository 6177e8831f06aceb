//! Rule matching for inbound messages.
//!
//! A [`Matcher`] is an immutable, ordered list of steps. Evaluation runs the
//! steps left to right and stops at the first one that fails, so a matcher is
//! one short-circuiting conjunction that also gathers [`Extracted`] values
//! for the handler.
//!
//! # Copy-on-write chaining
//!
//! Every chaining call appends one step and returns the matcher. Steps live
//! behind an `Arc` that is copied only when shared, so a partially built
//! matcher can be cloned and reused as a prefix for several rules:
//!
//! ```rust,ignore
//! use quip_framework::all;
//!
//! let to_me = all().directed_at_bot();
//! let hello = to_me.clone().contains(["hello", "hi"]);
//! let weather = to_me.starts_with(["weather"]);
//! ```
//!
//! # Step order
//!
//! Steps with side effects run in chain order like any other. A throttle
//! placed before a step that later fails still consumes its fire for that
//! key, so put narrowing predicates (channel, directed-at-bot) first and
//! `throttled_by` last.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use quip_core::{DEFAULT_THROTTLE_TTL, InboundMessage, KeyedThrottle};
use regex::Regex;
use tracing::trace;
use url::Url;

use crate::outcome::{Extracted, MatchOutcome, MatchedUrl, StepOutcome};

/// A type-erased predicate over a message.
pub type CheckFn = Arc<dyn Fn(&InboundMessage) -> bool + Send + Sync>;

/// A type-erased throttle key function.
pub type KeyFn = Arc<dyn Fn(&InboundMessage) -> String + Send + Sync>;

// ============================================================================
// Throttle source
// ============================================================================

/// The throttle a `throttled_by` step consults.
///
/// A [`Duration`] creates a throttle private to the step; an
/// `Arc<KeyedThrottle>` lets several rules share one cooldown.
#[derive(Debug, Clone)]
pub enum ThrottleLock {
    /// A throttle shared with other rules.
    Shared(Arc<KeyedThrottle>),
    /// A new throttle with this cooldown.
    Ttl(Duration),
}

impl ThrottleLock {
    fn into_throttle(self) -> Arc<KeyedThrottle> {
        match self {
            Self::Shared(lock) => lock,
            Self::Ttl(ttl) => Arc::new(KeyedThrottle::new(ttl)),
        }
    }
}

impl From<Arc<KeyedThrottle>> for ThrottleLock {
    fn from(lock: Arc<KeyedThrottle>) -> Self {
        Self::Shared(lock)
    }
}

impl From<Duration> for ThrottleLock {
    fn from(ttl: Duration) -> Self {
        Self::Ttl(ttl)
    }
}

// ============================================================================
// URL filter
// ============================================================================

/// Selects links in a message by host and, optionally, by path.
///
/// `www.` in front of the host is accepted. Every path filter that is set
/// must pass.
#[derive(Debug, Clone)]
pub struct UrlFilter {
    host: String,
    pathname: Option<String>,
    path_like: Option<Regex>,
    path_contains: Option<String>,
    path_starts_with: Option<String>,
}

impl UrlFilter {
    /// Matches links on `host`.
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            pathname: None,
            path_like: None,
            path_contains: None,
            path_starts_with: None,
        }
    }

    /// Requires the path to equal `pathname`.
    pub fn pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    /// Requires the path to match `pattern`; its captures are kept per link.
    pub fn path_like(mut self, pattern: Regex) -> Self {
        self.path_like = Some(pattern);
        self
    }

    /// Requires the path to contain `fragment`.
    pub fn path_contains(mut self, fragment: impl Into<String>) -> Self {
        self.path_contains = Some(fragment.into());
        self
    }

    /// Requires the path to start with `prefix`.
    pub fn path_starts_with(mut self, prefix: impl Into<String>) -> Self {
        self.path_starts_with = Some(prefix.into());
        self
    }

    fn accepts_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        host == self.host || host.strip_prefix("www.") == Some(self.host.as_str())
    }

    fn select(&self, url: Url, label: Option<String>) -> Option<MatchedUrl> {
        if !self.accepts_host(&url) {
            return None;
        }

        let path = url.path();
        if self.pathname.as_deref().is_some_and(|p| p != path)
            || self.path_contains.as_deref().is_some_and(|p| !path.contains(p))
            || self
                .path_starts_with
                .as_deref()
                .is_some_and(|p| !path.starts_with(p))
        {
            return None;
        }

        let path_captures = match &self.path_like {
            Some(pattern) => Some(capture_groups(&pattern.captures(path)?)),
            None => None,
        };

        Some(MatchedUrl {
            url,
            label,
            path_captures,
        })
    }
}

fn capture_groups(caps: &regex::Captures<'_>) -> Vec<Option<String>> {
    caps.iter()
        .map(|group| group.map(|m| m.as_str().to_string()))
        .collect()
}

// ============================================================================
// Steps
// ============================================================================

#[derive(Clone)]
enum Step {
    StartsWith(Vec<String>),
    Contains(Vec<String>),
    Matches(Vec<Regex>),
    MessageIs(Vec<String>),
    DirectedAtBot,
    MentionsBot,
    IsDirectMessage,
    InChannel(Vec<String>),
    ByUser(Vec<String>),
    Url(UrlFilter),
    Throttle { lock: Arc<KeyedThrottle>, key: KeyFn },
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Not(Matcher),
    Check(CheckFn),
}

impl Step {
    fn kind(&self) -> &'static str {
        match self {
            Self::StartsWith(_) => "starts_with",
            Self::Contains(_) => "contains",
            Self::Matches(_) => "matches",
            Self::MessageIs(_) => "message_is",
            Self::DirectedAtBot => "directed_at_bot",
            Self::MentionsBot => "mentions_bot",
            Self::IsDirectMessage => "is_direct_message",
            Self::InChannel(_) => "in_channel",
            Self::ByUser(_) => "by_user",
            Self::Url(_) => "url",
            Self::Throttle { .. } => "throttled_by",
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::Not(_) => "not",
            Self::Check(_) => "check",
        }
    }

    fn evaluate(&self, msg: &InboundMessage) -> StepOutcome {
        let text = msg.text();
        match self {
            Self::StartsWith(prefixes) => prefixes
                .iter()
                .find_map(|prefix| text.strip_prefix(prefix.as_str()))
                .map_or(StepOutcome::Fail, |rest| {
                    StepOutcome::Value(Extracted::Text(rest.trim_start().to_string()))
                }),
            Self::Contains(needles) => needles.iter().any(|n| text.contains(n.as_str())).into(),
            Self::Matches(patterns) => patterns
                .iter()
                .find_map(|pattern| pattern.captures(text))
                .map_or(StepOutcome::Fail, |caps| {
                    StepOutcome::Value(Extracted::Captures(capture_groups(&caps)))
                }),
            Self::MessageIs(candidates) => candidates.iter().any(|c| c == text).into(),
            Self::DirectedAtBot => msg.directed_at_bot().into(),
            Self::MentionsBot => msg.mentions_bot().into(),
            Self::IsDirectMessage => msg.is_direct_message().into(),
            Self::InChannel(names) => msg
                .channel_name()
                .is_some_and(|name| names.iter().any(|n| n == name))
                .into(),
            Self::ByUser(names) => msg
                .sender_name()
                .is_some_and(|name| names.iter().any(|n| n == name))
                .into(),
            Self::Url(filter) => {
                let urls: Vec<_> = msg
                    .extracted_links()
                    .iter()
                    .filter_map(|link| {
                        let url = Url::parse(&link.url).ok()?;
                        filter.select(url, link.label.clone())
                    })
                    .collect();
                if urls.is_empty() {
                    StepOutcome::Fail
                } else {
                    StepOutcome::Value(Extracted::Urls(urls))
                }
            }
            Self::Throttle { lock, key } => lock.attempt(&key(msg)).into(),
            Self::And(matchers) => {
                let mut extracted = Vec::new();
                for matcher in matchers {
                    let outcome = matcher.evaluate(msg);
                    extracted.extend(outcome.extracted);
                    if !outcome.matched {
                        return StepOutcome::Composite(MatchOutcome::failed(extracted));
                    }
                }
                StepOutcome::Composite(MatchOutcome::matched(extracted))
            }
            Self::Or(matchers) => {
                let mut partial = Vec::new();
                for matcher in matchers {
                    let outcome = matcher.evaluate(msg);
                    if outcome.matched {
                        return StepOutcome::Composite(outcome);
                    }
                    partial.extend(outcome.extracted);
                }
                StepOutcome::Composite(MatchOutcome::failed(partial))
            }
            Self::Not(matcher) => (!matcher.evaluate(msg).matched).into(),
            Self::Check(check) => check(msg).into(),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartsWith(v) | Self::Contains(v) | Self::MessageIs(v) => {
                f.debug_tuple(self.kind()).field(v).finish()
            }
            Self::InChannel(v) | Self::ByUser(v) => f.debug_tuple(self.kind()).field(v).finish(),
            Self::Matches(v) => f.debug_tuple(self.kind()).field(v).finish(),
            Self::Url(filter) => f.debug_tuple(self.kind()).field(filter).finish(),
            Self::And(v) | Self::Or(v) => f.debug_tuple(self.kind()).field(v).finish(),
            Self::Not(m) => f.debug_tuple(self.kind()).field(m).finish(),
            Self::Throttle { lock, .. } => f
                .debug_struct(self.kind())
                .field("ttl", &lock.ttl())
                .finish_non_exhaustive(),
            Self::DirectedAtBot | Self::MentionsBot | Self::IsDirectMessage | Self::Check(_) => {
                f.write_str(self.kind())
            }
        }
    }
}

// ============================================================================
// Matcher
// ============================================================================

#[derive(Clone, Default)]
struct MatcherInner {
    steps: Vec<Step>,
    name: Option<String>,
}

/// An immutable chain of predicate and extractor steps.
///
/// An empty matcher matches every message.
#[derive(Clone, Default)]
pub struct Matcher {
    inner: Arc<MatcherInner>,
}

fn strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl Matcher {
    /// Creates an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, step: Step) -> Self {
        Arc::make_mut(&mut self.inner).steps.push(step);
        self
    }

    /// Sets a name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).name = Some(name.into());
        self
    }

    /// Returns the name, if set.
    pub fn get_name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the number of steps.
    pub fn step_count(&self) -> usize {
        self.inner.steps.len()
    }

    /// Text starts with any prefix; emits the rest, left-trimmed.
    pub fn starts_with<I, S>(self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Step::StartsWith(strings(prefixes)))
    }

    /// Text contains any of the substrings.
    pub fn contains<I, S>(self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Step::Contains(strings(needles)))
    }

    /// Text matches any pattern; emits the first match's capture groups.
    pub fn matches<I>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = Regex>,
    {
        self.push(Step::Matches(patterns.into_iter().collect()))
    }

    /// Text equals one of the candidates exactly.
    pub fn message_is<I, S>(self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Step::MessageIs(strings(candidates)))
    }

    /// Sent in a direct conversation or starting with a mention of the bot.
    pub fn directed_at_bot(self) -> Self {
        self.push(Step::DirectedAtBot)
    }

    /// Starts with a mention of the bot.
    pub fn mentions_bot(self) -> Self {
        self.push(Step::MentionsBot)
    }

    /// Sent in a direct conversation with the bot.
    pub fn is_direct_message(self) -> Self {
        self.push(Step::IsDirectMessage)
    }

    /// Posted in one of the named channels. A leading `#` is ignored.
    #[doc(alias = "in_channels")]
    pub fn in_channel<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = strings(names)
            .into_iter()
            .map(|name| name.trim_start_matches('#').to_string())
            .collect();
        self.push(Step::InChannel(names))
    }

    /// Sent by one of the named users.
    pub fn by_user<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Step::ByUser(strings(names)))
    }

    /// Contains links passing `filter`; emits them.
    pub fn url(self, filter: UrlFilter) -> Self {
        self.push(Step::Url(filter))
    }

    /// Passes at most once per key per cooldown window.
    pub fn throttled_by<L, F>(self, lock: L, key: F) -> Self
    where
        L: Into<ThrottleLock>,
        F: Fn(&InboundMessage) -> String + Send + Sync + 'static,
    {
        self.push(Step::Throttle {
            lock: lock.into().into_throttle(),
            key: Arc::new(key),
        })
    }

    /// Throttled per sender, four hours.
    pub fn throttled_by_user(self) -> Self {
        self.throttled_by(DEFAULT_THROTTLE_TTL, |msg| {
            msg.sender_id().unwrap_or_default().to_string()
        })
    }

    /// Throttled per conversation, four hours.
    pub fn throttled_by_conversation(self) -> Self {
        self.throttled_by(DEFAULT_THROTTLE_TTL, |msg| {
            msg.conversation_id().to_string()
        })
    }

    /// Every matcher matches; emits all their values as one group.
    pub fn and<I>(self, matchers: I) -> Self
    where
        I: IntoIterator<Item = Matcher>,
    {
        self.push(Step::And(matchers.into_iter().collect()))
    }

    /// The first matcher that matches decides; emits its values as one group.
    pub fn or<I>(self, matchers: I) -> Self
    where
        I: IntoIterator<Item = Matcher>,
    {
        self.push(Step::Or(matchers.into_iter().collect()))
    }

    /// `matcher` does not match.
    pub fn not(self, matcher: Matcher) -> Self {
        self.push(Step::Not(matcher))
    }

    /// A custom predicate, evaluated in chain order.
    pub fn check<F>(self, f: F) -> Self
    where
        F: Fn(&InboundMessage) -> bool + Send + Sync + 'static,
    {
        self.push(Step::Check(Arc::new(f)))
    }

    /// Evaluates the chain against `msg`.
    pub fn evaluate(&self, msg: &InboundMessage) -> MatchOutcome {
        let mut extracted = Vec::new();

        for (index, step) in self.inner.steps.iter().enumerate() {
            let outcome = step.evaluate(msg);
            trace!(
                matcher = self.get_name().unwrap_or("unnamed"),
                step = step.kind(),
                index,
                ?outcome,
                "Evaluated step"
            );

            match outcome {
                StepOutcome::Fail => return MatchOutcome::failed(extracted),
                StepOutcome::Pass => {}
                StepOutcome::Value(value) => extracted.push(value),
                StepOutcome::Composite(inner) if inner.matched => {
                    extracted.push(Extracted::Group(inner.extracted));
                }
                StepOutcome::Composite(_) => return MatchOutcome::failed(extracted),
            }
        }

        MatchOutcome::matched(extracted)
    }

    /// Whether the chain matches `msg`.
    pub fn is_match(&self, msg: &InboundMessage) -> bool {
        self.evaluate(msg).matched
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("name", &self.inner.name)
            .field("steps", &self.inner.steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use quip_core::{Channel, DirectConversation, MessageEventData, User};

    fn data(channel: &str, text: &str) -> MessageEventData {
        MessageEventData {
            ts: "1.0".into(),
            text: Some(text.into()),
            user: Some("U1".into()),
            channel: channel.into(),
            ..Default::default()
        }
    }

    fn sender() -> Option<User> {
        Some(User {
            id: "U1".into(),
            name: "ann".into(),
            ..Default::default()
        })
    }

    fn channel_message(text: &str) -> InboundMessage {
        let channel = Channel {
            id: "C1".into(),
            name: "general".into(),
            ..Default::default()
        };
        InboundMessage::new(data("C1", text), "UBOT", sender(), Some(channel), None)
    }

    fn direct_message(text: &str) -> InboundMessage {
        let dm = DirectConversation {
            id: "D1".into(),
            user: "U1".into(),
            is_user_deleted: false,
        };
        InboundMessage::new(data("D1", text), "UBOT", sender(), None, Some(dm))
    }

    fn text(value: &str) -> Extracted {
        Extracted::Text(value.to_string())
    }

    #[test]
    fn test_empty_matcher_matches() {
        let outcome = Matcher::new().evaluate(&channel_message("anything"));
        assert_eq!(outcome, MatchOutcome::matched(vec![]));
    }

    #[test]
    fn test_starts_with_extracts_trimmed_rest() {
        let m = Matcher::new().starts_with(["foo"]);

        assert_eq!(
            m.evaluate(&channel_message("foo bar")).extracted,
            vec![text("bar")]
        );
        assert_eq!(m.evaluate(&channel_message("food")).extracted, vec![text("d")]);
        assert_eq!(m.evaluate(&channel_message("foo")).extracted, vec![text("")]);
        assert!(!m.is_match(&channel_message("baz")));
    }

    #[test]
    fn test_starts_with_uses_text_after_mention() {
        let m = Matcher::new().starts_with(["weather", "forecast"]);
        let outcome = m.evaluate(&channel_message("<@UBOT> forecast tomorrow"));
        assert_eq!(outcome.extracted, vec![text("tomorrow")]);
    }

    #[test]
    fn test_contains_and_message_is() {
        let msg = channel_message("well hi there");

        assert!(Matcher::new().contains(["hello", "hi"]).is_match(&msg));
        assert!(!Matcher::new().contains(["bye"]).is_match(&msg));
        assert!(Matcher::new().message_is(["well hi there"]).is_match(&msg));
        assert!(!Matcher::new().message_is(["well hi"]).is_match(&msg));
    }

    #[test]
    fn test_matches_emits_first_matching_captures() {
        let m = Matcher::new().matches([
            Regex::new(r"^no (\w+)$").unwrap(),
            Regex::new(r"(\d+)\s*(\w+)?").unwrap(),
        ]);

        let outcome = m.evaluate(&channel_message("give me 42"));
        assert_eq!(
            outcome.extracted,
            vec![Extracted::Captures(vec![Some("42".into()), Some("42".into()), None])]
        );
    }

    #[test]
    fn test_context_predicates() {
        let dm = direct_message("hi");
        let mention = channel_message("<@UBOT> hi");
        let plain = channel_message("hi");

        let directed = Matcher::new().directed_at_bot();
        assert!(directed.is_match(&dm));
        assert!(directed.is_match(&mention));
        assert!(!directed.is_match(&plain));

        assert!(Matcher::new().mentions_bot().is_match(&mention));
        assert!(!Matcher::new().mentions_bot().is_match(&dm));
        assert!(Matcher::new().is_direct_message().is_match(&dm));
        assert!(!Matcher::new().is_direct_message().is_match(&mention));
    }

    #[test]
    fn test_in_channel_and_by_user() {
        let msg = channel_message("hi");

        assert!(Matcher::new().in_channel(["#general"]).is_match(&msg));
        assert!(Matcher::new().in_channel(["random", "general"]).is_match(&msg));
        assert!(!Matcher::new().in_channel(["random"]).is_match(&msg));
        assert!(!Matcher::new().in_channel(["general"]).is_match(&direct_message("hi")));

        assert!(Matcher::new().by_user(["ann"]).is_match(&msg));
        assert!(!Matcher::new().by_user(["bob"]).is_match(&msg));
    }

    #[test]
    fn test_url_filter() {
        let msg = channel_message(
            "look <https://www.example.com/posts/42|post> and <https://other.org/posts/1>",
        );

        let by_id = UrlFilter::host("example.com").path_like(Regex::new(r"^/posts/(\d+)$").unwrap());
        let outcome = Matcher::new().url(by_id).evaluate(&msg);
        assert!(outcome.matched);
        let urls = outcome.extracted[0].as_urls().unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].label.as_deref(), Some("post"));
        assert_eq!(
            urls[0].path_captures,
            Some(vec![Some("/posts/42".into()), Some("42".into())])
        );

        assert!(
            Matcher::new()
                .url(UrlFilter::host("other.org").path_starts_with("/posts"))
                .is_match(&msg)
        );
        assert!(
            !Matcher::new()
                .url(UrlFilter::host("example.com").pathname("/posts"))
                .is_match(&msg)
        );
        assert!(
            !Matcher::new()
                .url(UrlFilter::host("example.com").path_contains("users"))
                .is_match(&msg)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_by_user() {
        let m = Matcher::new().contains(["hi"]).throttled_by_user();
        let msg = channel_message("hi");

        assert!(m.is_match(&msg));
        assert!(!m.is_match(&msg));

        tokio::time::advance(DEFAULT_THROTTLE_TTL).await;
        assert!(m.is_match(&msg));
    }

    #[test]
    fn test_shared_throttle_across_rules() {
        let lock = Arc::new(KeyedThrottle::new(Duration::from_secs(60)));
        let key = |m: &InboundMessage| m.conversation_id().to_string();
        let first = Matcher::new().throttled_by(Arc::clone(&lock), key);
        let second = Matcher::new().throttled_by(lock, key);
        let msg = channel_message("hi");

        assert!(first.is_match(&msg));
        assert!(!second.is_match(&msg));
    }

    #[test]
    fn test_throttle_consumed_by_later_failure() {
        let misordered = Matcher::new()
            .throttled_by(Duration::from_secs(60), |m| m.conversation_id().to_string())
            .contains(["bye"]);
        let hello = channel_message("hello");
        let bye = channel_message("bye");

        assert!(!misordered.is_match(&hello));
        assert!(!misordered.is_match(&bye));
    }

    #[test]
    fn test_and_concatenates_results() {
        let m = Matcher::new().and([
            Matcher::new().starts_with(["say"]),
            Matcher::new().matches([Regex::new(r"(\w+)$").unwrap()]),
        ]);

        let outcome = m.evaluate(&channel_message("say hello"));
        assert_eq!(
            outcome.extracted,
            vec![Extracted::Group(vec![
                text("hello"),
                Extracted::Captures(vec![Some("hello".into()), Some("hello".into())]),
            ])]
        );
    }

    #[test]
    fn test_and_fails_when_any_fails() {
        let m = Matcher::new().and([
            Matcher::new().contains(["a"]),
            Matcher::new().contains(["z"]),
        ]);
        assert!(!m.is_match(&channel_message("abc")));
    }

    #[test]
    fn test_and_partial_results_stop_at_failure() {
        let m = Matcher::new().and([
            Matcher::new().starts_with(["x"]),
            Matcher::new().contains(["nope"]),
            Matcher::new().starts_with(["x"]),
        ]);

        let StepOutcome::Composite(inner) = m.inner.steps[0].evaluate(&channel_message("x y"))
        else {
            panic!("expected composite");
        };
        assert!(!inner.matched);
        assert_eq!(inner.extracted, vec![text("y")]);

        // The chain itself reports only what came before the composite.
        assert_eq!(m.evaluate(&channel_message("x y")), MatchOutcome::failed(vec![]));
    }

    #[test]
    fn test_or_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let stub = Matcher::new().check(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        let m = Matcher::new().or([Matcher::new().starts_with(["hi"]), stub]);
        let outcome = m.evaluate(&channel_message("hi there"));

        assert_eq!(outcome.extracted, vec![Extracted::Group(vec![text("there")])]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(m.is_match(&channel_message("bye")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_or_fails_when_none_match() {
        let m = Matcher::new().or([
            Matcher::new().contains(["a"]),
            Matcher::new().contains(["b"]),
        ]);
        assert!(!m.is_match(&channel_message("xyz")));
    }

    #[test]
    fn test_not_inverts() {
        let m = Matcher::new().not(Matcher::new().contains(["spoiler"]));

        assert!(m.is_match(&channel_message("nice movie")));
        assert!(!m.is_match(&channel_message("spoiler: ...")));
        assert!(m.evaluate(&channel_message("ok")).extracted.is_empty());
    }

    #[test]
    fn test_chain_stops_at_first_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let m = Matcher::new().contains(["never"]).check(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert!(!m.is_match(&channel_message("hi")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prefix_reuse_does_not_leak_steps() {
        let base = Matcher::new().directed_at_bot();
        let hello = base.clone().contains(["hello"]);
        let bye = base.clone().contains(["bye"]);

        assert_eq!(base.step_count(), 1);
        assert_eq!(hello.step_count(), 2);

        let msg = direct_message("hello");
        assert!(base.is_match(&msg));
        assert!(hello.is_match(&msg));
        assert!(!bye.is_match(&msg));
    }
}

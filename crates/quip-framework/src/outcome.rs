//! Values a matcher extracts from a message.

use url::Url;

/// One value emitted by a matcher step, passed on to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Remainder of the text after a matched prefix.
    Text(String),
    /// Capture groups of a regex match; index 0 is the whole match.
    Captures(Vec<Option<String>>),
    /// Links that passed a URL filter.
    Urls(Vec<MatchedUrl>),
    /// Values of a successful `and`/`or`, kept together.
    Group(Vec<Extracted>),
}

impl Extracted {
    /// Returns the text, if this is [`Extracted::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the capture groups, if this is [`Extracted::Captures`].
    pub fn as_captures(&self) -> Option<&[Option<String>]> {
        match self {
            Self::Captures(groups) => Some(groups),
            _ => None,
        }
    }

    /// Returns the links, if this is [`Extracted::Urls`].
    pub fn as_urls(&self) -> Option<&[MatchedUrl]> {
        match self {
            Self::Urls(urls) => Some(urls),
            _ => None,
        }
    }

    /// Returns the nested values, if this is [`Extracted::Group`].
    pub fn as_group(&self) -> Option<&[Extracted]> {
        match self {
            Self::Group(values) => Some(values),
            _ => None,
        }
    }

    /// Visits this value and, depth-first, everything nested in it.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Extracted)) {
        visit(self);
        if let Self::Group(values) = self {
            for value in values {
                value.walk(visit);
            }
        }
    }
}

/// A link that passed a URL filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedUrl {
    /// The parsed link.
    pub url: Url,
    /// Link label, when the message showed one.
    pub label: Option<String>,
    /// Capture groups of the path pattern, when one was used.
    pub path_captures: Option<Vec<Option<String>>>,
}

/// Result of evaluating a matcher against one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Whether every step passed.
    pub matched: bool,
    /// Values emitted by the steps, in chain order.
    ///
    /// On a failed match this holds whatever was gathered before the failing
    /// step. Only the values of a successful match reach handlers.
    pub extracted: Vec<Extracted>,
}

impl MatchOutcome {
    /// A successful outcome.
    pub fn matched(extracted: Vec<Extracted>) -> Self {
        Self {
            matched: true,
            extracted,
        }
    }

    /// A failed outcome carrying partial results.
    pub fn failed(extracted: Vec<Extracted>) -> Self {
        Self {
            matched: false,
            extracted,
        }
    }
}

/// Result of a single matcher step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// The step rejected the message.
    Fail,
    /// The step passed without emitting anything.
    Pass,
    /// The step passed and emitted a value.
    Value(Extracted),
    /// A nested matcher ran; its outcome decides this step.
    Composite(MatchOutcome),
}

impl From<bool> for StepOutcome {
    fn from(passed: bool) -> Self {
        if passed { Self::Pass } else { Self::Fail }
    }
}

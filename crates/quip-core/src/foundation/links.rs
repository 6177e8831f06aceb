//! Extraction of platform-formatted links from message text.
//!
//! Links arrive wrapped in angle brackets, optionally followed by a label:
//! `<https://example.com/a|example>`.

use std::sync::LazyLock;

use regex::Regex;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(http[^|>\s]+)(?:\|([^>]+))?>").expect("link pattern is valid")
});

/// A link found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// The link target.
    pub url: String,
    /// The display label, if the link carried one.
    pub label: Option<String>,
}

/// Returns every link in `text`, in order of appearance.
pub fn extract_links(text: &str) -> Vec<Link> {
    LINK_RE
        .captures_iter(text)
        .map(|caps| Link {
            url: caps[1].to_string(),
            label: caps.get(2).map(|m| m.as_str().to_string()),
        })
        .collect()
}

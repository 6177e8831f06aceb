//! Entry points for building matchers.
//!
//! # Example
//!
//! ```rust,ignore
//! use quip_framework::{all, directed_at_bot};
//!
//! registry.register_primary(directed_at_bot().contains(["hi"]), greet);
//! registry.register_fallthrough(all().mentions_bot(), shrug);
//! ```

use crate::matcher::Matcher;

/// A matcher with no steps; matches every message.
///
/// The usual start of a chain.
pub fn all() -> Matcher {
    Matcher::new()
}

/// Messages in a direct conversation or starting with a mention of the bot.
pub fn directed_at_bot() -> Matcher {
    Matcher::new().name("directed_at_bot").directed_at_bot()
}

/// Messages starting with a mention of the bot.
pub fn mentions_bot() -> Matcher {
    Matcher::new().name("mentions_bot").mentions_bot()
}

/// Messages in a direct conversation with the bot.
pub fn is_direct_message() -> Matcher {
    Matcher::new().name("is_direct_message").is_direct_message()
}

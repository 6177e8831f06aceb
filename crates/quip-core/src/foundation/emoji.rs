//! Emoji code normalization.

/// Marker separating an emoji name from its skin-tone modifier.
const SKIN_TONE_MARKER: &str = "::skin-tone";

/// Splits a reaction or inline emoji code into its name and skin tone.
///
/// Accepts both inline codes (`:wave::skin-tone-4:`) and reaction codes
/// (`wave::skin-tone-4`).
///
/// ```
/// use quip_core::normalize_emoji;
///
/// assert_eq!(normalize_emoji(":wave::skin-tone-4:"), ("wave".to_string(), Some("skin-tone-4".to_string())));
/// assert_eq!(normalize_emoji("wave"), ("wave".to_string(), None));
/// ```
pub fn normalize_emoji(code: &str) -> (String, Option<String>) {
    let code = match code.strip_prefix(':') {
        Some(inner) => inner.strip_suffix(':').unwrap_or(inner),
        None => code,
    };

    match code.find(SKIN_TONE_MARKER) {
        Some(idx) => (code[..idx].to_string(), Some(code[idx + 2..].to_string())),
        None => (code.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_with_skin_tone() {
        let (emoji, tone) = normalize_emoji(":wave::skin-tone-4:");
        assert_eq!(emoji, "wave");
        assert_eq!(tone.as_deref(), Some("skin-tone-4"));
    }

    #[test]
    fn test_inline_without_skin_tone() {
        let (emoji, tone) = normalize_emoji(":wave:");
        assert_eq!(emoji, "wave");
        assert!(tone.is_none());
    }

    #[test]
    fn test_reaction_with_skin_tone() {
        let (emoji, tone) = normalize_emoji("wave::skin-tone-4");
        assert_eq!(emoji, "wave");
        assert_eq!(tone.as_deref(), Some("skin-tone-4"));
    }

    #[test]
    fn test_reaction_without_skin_tone() {
        let (emoji, tone) = normalize_emoji("wave");
        assert_eq!(emoji, "wave");
        assert!(tone.is_none());
    }
}

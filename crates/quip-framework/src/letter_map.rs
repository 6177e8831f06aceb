//! Spelling words with emoji reactions.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use parking_lot::Mutex;
use quip_core::BoundedRandomPicker;
use serde::{Deserialize, Serialize};

use crate::error::LetterMapError;

/// Emoji configured for one character: a flat list, or prioritized tiers.
///
/// In a configuration file:
///
/// ```toml
/// [letters]
/// a = ["a", "arrow_up_small"]
/// b = [["b"], ["bee", "bread"]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LetterEmojis {
    /// One tier.
    Flat(Vec<String>),
    /// Tiers in priority order.
    Tiered(Vec<Vec<String>>),
}

impl LetterEmojis {
    fn into_tiers(self) -> Vec<Vec<String>> {
        match self {
            Self::Flat(items) => vec![items],
            Self::Tiered(tiers) => tiers,
        }
    }
}

/// Maps single characters to emoji, never repeating an emoji within a word.
///
/// A word with more of one character than there are emoji for it cannot be
/// spelled, since a message can carry each reaction only once.
pub struct EmojiLetterMap {
    letters: HashMap<char, BoundedRandomPicker<String>>,
    // Serializes whole words so two spellings never interleave draws.
    spelling: Mutex<()>,
}

impl EmojiLetterMap {
    /// Builds a map; every key must be exactly one character.
    pub fn new<K>(mapping: impl IntoIterator<Item = (K, LetterEmojis)>) -> Result<Self, LetterMapError>
    where
        K: AsRef<str>,
    {
        Self::build(mapping, BoundedRandomPicker::new)
    }

    /// Builds a map whose random draws are reproducible.
    pub fn with_seed<K>(
        mapping: impl IntoIterator<Item = (K, LetterEmojis)>,
        seed: u64,
    ) -> Result<Self, LetterMapError>
    where
        K: AsRef<str>,
    {
        Self::build(mapping, |tiers| BoundedRandomPicker::with_seed(tiers, seed))
    }

    fn build<K>(
        mapping: impl IntoIterator<Item = (K, LetterEmojis)>,
        picker: impl Fn(Vec<Vec<String>>) -> BoundedRandomPicker<String>,
    ) -> Result<Self, LetterMapError>
    where
        K: AsRef<str>,
    {
        let mut letters = HashMap::new();
        for (key, emojis) in mapping {
            let key = key.as_ref();
            let mut chars = key.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(LetterMapError::InvalidKey(key.to_string()));
            };
            letters.insert(c, picker(emojis.into_tiers()));
        }

        Ok(Self {
            letters,
            spelling: Mutex::new(()),
        })
    }

    /// Returns one emoji per character of `word`, lower-cased first.
    ///
    /// Every character touched is reset afterwards, whether or not the word
    /// could be spelled, so the next word starts from a full set.
    pub fn emojis_for_word(&self, word: &str) -> Result<Vec<String>, LetterMapError> {
        let _guard = self.spelling.lock();
        let mut touched = BTreeSet::new();

        let result = word
            .to_lowercase()
            .chars()
            .map(|c| {
                touched.insert(c);
                self.letters
                    .get(&c)
                    .and_then(BoundedRandomPicker::next)
                    .ok_or(LetterMapError::NoEmoji(c))
            })
            .collect();

        for c in touched {
            if let Some(picker) = self.letters.get(&c) {
                picker.reset();
            }
        }
        result
    }

    /// Whether `c` has any emoji configured.
    pub fn contains(&self, c: char) -> bool {
        self.letters.contains_key(&c)
    }

    /// Number of configured characters.
    pub fn len(&self) -> usize {
        self.letters.len()
    }

    /// Whether no character is configured.
    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }
}

impl fmt::Debug for EmojiLetterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.letters.keys().collect();
        keys.sort();
        f.debug_struct("EmojiLetterMap").field("letters", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(items: &[&str]) -> LetterEmojis {
        LetterEmojis::Flat(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_rejects_multi_character_key() {
        let err = EmojiLetterMap::new([("ab", flat(&["x"]))]).unwrap_err();
        assert!(matches!(err, LetterMapError::InvalidKey(ref k) if k == "ab"));
        assert!(EmojiLetterMap::new([("", flat(&["x"]))]).is_err());
    }

    #[test]
    fn test_spells_lowercased_word_without_repeats() {
        let map = EmojiLetterMap::with_seed(
            [("a", flat(&["a", "arrow_up_small"])), ("b", flat(&["b"]))],
            7,
        )
        .unwrap();

        let emojis = map.emojis_for_word("AbA").unwrap();
        assert_eq!(emojis.len(), 3);
        assert_eq!(emojis[1], "b");
        assert_ne!(emojis[0], emojis[2]);
    }

    #[test]
    fn test_tiers_are_used_in_order() {
        let tiers = LetterEmojis::Tiered(vec![vec!["one".into()], vec!["two".into()]]);
        let map = EmojiLetterMap::new([("o", tiers)]).unwrap();

        assert_eq!(map.emojis_for_word("oo").unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_exhausted_letter_fails_and_still_resets() {
        let map = EmojiLetterMap::new([("z", flat(&["zzz"]))]).unwrap();

        assert!(matches!(map.emojis_for_word("zz"), Err(LetterMapError::NoEmoji('z'))));
        assert_eq!(map.emojis_for_word("z").unwrap(), vec!["zzz"]);
    }

    #[test]
    fn test_unknown_character() {
        let map = EmojiLetterMap::new([("a", flat(&["a"]))]).unwrap();
        assert!(matches!(map.emojis_for_word("a!"), Err(LetterMapError::NoEmoji('!'))));
    }

    #[test]
    fn test_deserializes_flat_and_tiered() {
        let mapping: HashMap<String, LetterEmojis> =
            serde_json::from_str(r#"{"a": ["a"], "b": [["b"], ["bee"]]}"#).unwrap();

        assert_eq!(mapping["a"], flat(&["a"]));
        assert!(matches!(mapping["b"], LetterEmojis::Tiered(ref t) if t.len() == 2));
    }
}

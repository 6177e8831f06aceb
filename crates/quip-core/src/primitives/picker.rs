//! "Pick without immediate repeat" generators.
//!
//! [`BoundedRandomPicker`] draws without replacement from prioritized tiers;
//! [`RoundRobinPicker`] cycles through a list with one cursor per key. Both
//! use interior mutability so a single picker can be shared between handlers.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// =============================================================================
// BoundedRandomPicker
// =============================================================================

/// What a [`BoundedRandomPicker`] does once every tier is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoReset {
    /// Yield nothing until [`reset`](BoundedRandomPicker::reset) is called.
    #[default]
    None,
    /// Start a new generation transparently.
    AfterAll,
}

struct PickerState<T> {
    unused: VecDeque<Vec<T>>,
    dirty: bool,
    rng: StdRng,
}

/// Draws items at random, without replacement, from prioritized tiers.
///
/// Tier 0 is exhausted before tier 1 is consulted, and so on. Within one
/// generation (between resets) every seeded item is returned at most once.
///
/// ```
/// use quip_core::BoundedRandomPicker;
///
/// let picker = BoundedRandomPicker::new(vec![vec!["a", "b"], vec!["z"]]);
/// let first_two = [picker.next().unwrap(), picker.next().unwrap()];
/// assert!(first_two.contains(&"a") && first_two.contains(&"b"));
/// assert_eq!(picker.next(), Some("z"));
/// assert_eq!(picker.next(), None);
/// ```
pub struct BoundedRandomPicker<T> {
    tiers: Vec<Vec<T>>,
    auto_reset: AutoReset,
    state: Mutex<PickerState<T>>,
}

impl<T: Clone> BoundedRandomPicker<T> {
    /// Creates a picker over the given tiers, seeded from the OS.
    pub fn new(tiers: Vec<Vec<T>>) -> Self {
        Self::with_rng(tiers, StdRng::from_os_rng())
    }

    /// Creates a picker with a deterministic random sequence.
    pub fn with_seed(tiers: Vec<Vec<T>>, seed: u64) -> Self {
        Self::with_rng(tiers, StdRng::seed_from_u64(seed))
    }

    /// Creates a picker over a single tier.
    pub fn flat(items: Vec<T>) -> Self {
        Self::new(vec![items])
    }

    fn with_rng(tiers: Vec<Vec<T>>, rng: StdRng) -> Self {
        let unused = tiers.iter().cloned().collect();
        Self {
            tiers,
            auto_reset: AutoReset::None,
            state: Mutex::new(PickerState {
                unused,
                dirty: false,
                rng,
            }),
        }
    }

    /// Sets the exhaustion policy.
    pub fn with_auto_reset(mut self, auto_reset: AutoReset) -> Self {
        self.auto_reset = auto_reset;
        self
    }

    /// Draws the next item, or `None` when the generation is exhausted.
    pub fn next(&self) -> Option<T> {
        let mut state = self.state.lock();

        if self.auto_reset == AutoReset::AfterAll && state.unused.iter().all(Vec::is_empty) {
            state.refill(&self.tiers);
        }

        let PickerState { unused, dirty, rng } = &mut *state;
        while let Some(tier) = unused.front_mut() {
            if tier.is_empty() {
                unused.pop_front();
                continue;
            }
            let index = rng.random_range(0..tier.len());
            *dirty = true;
            return Some(tier.swap_remove(index));
        }
        None
    }

    /// Starts a new generation. A no-op if nothing was drawn since the last one.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if state.dirty {
            state.refill(&self.tiers);
        }
    }

    /// Returns how many draws remain in this generation.
    pub fn remaining(&self) -> usize {
        self.state.lock().unused.iter().map(Vec::len).sum()
    }

    /// Returns the total number of seeded items.
    pub fn capacity(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }
}

impl<T: Clone> PickerState<T> {
    fn refill(&mut self, tiers: &[Vec<T>]) {
        self.unused = tiers.iter().cloned().collect();
        self.dirty = false;
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for BoundedRandomPicker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedRandomPicker")
            .field("tiers", &self.tiers)
            .field("auto_reset", &self.auto_reset)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RoundRobinPicker
// =============================================================================

/// Cycles through a list, keeping one cursor per key.
#[derive(Debug)]
pub struct RoundRobinPicker<T> {
    items: Vec<T>,
    default_cursor: Mutex<usize>,
    cursors: Mutex<HashMap<String, usize>>,
}

impl<T: Clone> RoundRobinPicker<T> {
    /// Creates a picker over `items`.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            default_cursor: Mutex::new(0),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the next item on the shared cursor.
    pub fn next(&self) -> Option<T> {
        let mut cursor = self.default_cursor.lock();
        self.advance(&mut cursor)
    }

    /// Returns the next item on `key`'s cursor.
    pub fn next_for(&self, key: &str) -> Option<T> {
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(key.to_string()).or_insert(0);
        self.advance(cursor)
    }

    /// Rewinds every cursor to the start.
    pub fn reset(&self) {
        *self.default_cursor.lock() = 0;
        self.cursors.lock().clear();
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there is nothing to pick.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn advance(&self, cursor: &mut usize) -> Option<T> {
        let item = self.items.get(*cursor)?.clone();
        *cursor = (*cursor + 1) % self.items.len();
        Some(item)
    }
}

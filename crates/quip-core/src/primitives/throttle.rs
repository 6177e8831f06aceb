//! Keyed cooldown gate.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Default cooldown for the per-user and per-conversation presets.
pub const DEFAULT_THROTTLE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

// Entries past their window are swept once the map grows beyond this.
const PRUNE_THRESHOLD: usize = 1024;

/// Allows at most one pass per key per TTL window.
///
/// The read of the last fire time and the write of the new one happen under a
/// single lock, so concurrent attempts on the same key cannot both pass.
///
/// Time is read from [`tokio::time::Instant`], which follows a paused test
/// clock.
#[derive(Debug)]
pub struct KeyedThrottle {
    ttl: Duration,
    last_fire: Mutex<HashMap<String, Instant>>,
}

impl KeyedThrottle {
    /// Creates a throttle with the given cooldown.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_fire: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cooldown.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` and records a fire if `key` has not fired within the TTL.
    pub fn attempt(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut last_fire = self.last_fire.lock();

        let allowed = match last_fire.get(key) {
            Some(&at) => now.duration_since(at) >= self.ttl,
            None => true,
        };
        if allowed {
            if last_fire.len() >= PRUNE_THRESHOLD {
                let ttl = self.ttl;
                last_fire.retain(|_, at| now.duration_since(*at) < ttl);
            }
            last_fire.insert(key.to_string(), now);
        }

        trace!(key, allowed, "Throttle attempt");
        allowed
    }

    /// Forgets the last fire of `key`.
    pub fn reset(&self, key: &str) {
        self.last_fire.lock().remove(key);
    }
}

impl Default for KeyedThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_attempt_respects_ttl() {
        let throttle = KeyedThrottle::new(Duration::from_millis(100));

        assert!(throttle.attempt("k"));
        assert!(!throttle.attempt("k"));

        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(!throttle.attempt("k"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(throttle.attempt("k"));
        assert!(!throttle.attempt("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let throttle = KeyedThrottle::new(Duration::from_secs(10));

        assert!(throttle.attempt("a"));
        assert!(throttle.attempt("b"));
        assert!(!throttle.attempt("a"));

        throttle.reset("a");
        assert!(throttle.attempt("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_keys_are_swept_when_full() {
        let throttle = KeyedThrottle::new(Duration::from_secs(10));
        for i in 0..PRUNE_THRESHOLD - 1 {
            assert!(throttle.attempt(&format!("old-{i}")));
        }
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(throttle.attempt("recent"));
        assert_eq!(throttle.last_fire.lock().len(), PRUNE_THRESHOLD);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(throttle.attempt("fresh"));

        // Only the still-active window survives the sweep.
        assert_eq!(throttle.last_fire.lock().len(), 2);
        assert!(!throttle.attempt("recent"));
        assert!(!throttle.attempt("fresh"));
        assert!(throttle.attempt("old-0"));
    }
}

//! Small stateful building blocks used by matchers and responses.

pub mod picker;
pub mod throttle;

pub use picker::{AutoReset, BoundedRandomPicker, RoundRobinPicker};
pub use throttle::{DEFAULT_THROTTLE_TTL, KeyedThrottle};

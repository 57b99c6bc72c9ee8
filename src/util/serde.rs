//! Serializable identifiers shared by schedulers, items and events.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity token of a bound item.
///
/// Tokens are handed out in registration order and are never reused by the
/// scheduler that issued them, so comparing two tokens also compares their
/// registration order. Tokens are only issued by a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub(crate) u64);

impl ItemId {
    /// Raw numeric value of the token.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Identity of a scheduler instance; tags every event and log record it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchedulerId(pub Uuid);

impl SchedulerId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SchedulerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

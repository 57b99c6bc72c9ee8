//! Error types for scheduler operations.

use thiserror::Error;

use crate::core::events::EventKind;
use crate::util::serde::ItemId;

/// Errors produced by scheduler components.
///
/// Every variant is reported synchronously to the caller of the rejected
/// operation; prior scheduler state is left untouched.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Construction or configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A constant weight is negative or not finite.
    #[error("invalid weight {weight}: weights must be finite and non-negative")]
    InvalidWeight {
        /// The rejected weight.
        weight: f64,
    },
    /// A supplied batch carried no slots.
    #[error("invalid supply of {0} slots: batches must be positive")]
    InvalidSupply(u32),
    /// Slots were supplied to a timer-driven scheduler.
    #[error("rounds are produced by a timer; external supply is not accepted")]
    SupplyUnsupported,
    /// The scheduler has been disposed.
    #[error("scheduler has been disposed")]
    Disposed,
    /// The item has been disposed or removed.
    #[error("{0} has been disposed")]
    ItemDisposed(ItemId),
    /// No registered item carries this identity.
    #[error("{0} is not registered")]
    UnknownItem(ItemId),
    /// The event kind is only emitted at scheduler scope.
    #[error("{kind:?} events are not emitted for items")]
    UnsupportedEvent {
        /// The rejected event kind.
        kind: EventKind,
    },
    /// An OS thread could not be spawned.
    #[error("failed to spawn {name}: {reason}")]
    Spawn {
        /// Name of the thread that failed to start.
        name: String,
        /// Underlying I/O error message.
        reason: String,
    },
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use prometheus_slot_scheduler::core::SchedulerError;
    ///
    /// assert_eq!(SchedulerError::Disposed.as_label(), "scheduler_disposed");
    /// ```
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidWeight { .. } => "invalid_weight",
            Self::InvalidSupply(_) => "invalid_supply",
            Self::SupplyUnsupported => "supply_unsupported",
            Self::Disposed => "scheduler_disposed",
            Self::ItemDisposed(_) => "item_disposed",
            Self::UnknownItem(_) => "unknown_item",
            Self::UnsupportedEvent { .. } => "unsupported_event",
            Self::Spawn { .. } => "spawn_failed",
        }
    }

    /// Whether the error reports use of a disposed scheduler or item.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed | Self::ItemDisposed(_))
    }
}

/// Result type returned by user callbacks; failures are surfaced through the
/// scheduler's `Exception` event.
pub type AppResult<T> = Result<T, anyhow::Error>;

//! Round sources: what triggers an allocation round and with how many slots.
//!
//! - [`AutomatedRounds`] fires every `period` with a fixed slot count.
//! - [`SuppliedRounds`] turns each externally supplied batch into one round.
//!
//! The scheduler's round loop calls [`RoundSource::next_round`] from a single
//! thread, so rounds are strictly sequential. Closing a source unblocks that
//! call, which then returns `None`.

mod automated;
mod supplied;

pub use automated::AutomatedRounds;
pub use supplied::SuppliedRounds;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Which kind of source drives a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundSourceKind {
    /// Internal timer.
    Automated,
    /// Externally supplied batches.
    Supplied,
}

/// How a round's slot budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// One accrual pass; slots nobody is eligible for are discarded.
    SinglePass,
    /// Accrual passes repeat until the budget is spent or demand runs out.
    Exhaustive,
}

/// Producer of rounds for one scheduler.
pub trait RoundSource: Send + Sync {
    /// Block until the next round is due and return its slot count, or `None`
    /// once the source is closed.
    fn next_round(&self) -> Option<u32>;

    /// Kind of source.
    fn kind(&self) -> RoundSourceKind;

    /// How a round's budget is spent.
    fn distribution(&self) -> Distribution;

    /// Forget timing state; called when the scheduler (re)starts.
    fn rearm(&self) {}

    /// Queue a batch of slots.
    ///
    /// # Errors
    ///
    /// Sources that are not externally fed return `SupplyUnsupported`.
    fn supply(&self, slots: u32) -> Result<(), SchedulerError> {
        let _ = slots;
        Err(SchedulerError::SupplyUnsupported)
    }

    /// Number of rounds waiting to be consumed.
    fn pending(&self) -> u64 {
        0
    }

    /// Stop producing rounds and unblock a pending `next_round`.
    fn close(&self);
}

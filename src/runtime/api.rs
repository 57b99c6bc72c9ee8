//! API-facing snapshot models.

use serde::{Deserialize, Serialize};

use crate::core::{
    AccumulationPolicy, DispatchMode, ItemHandle, ItemState, RoundSourceKind, Scheduler,
    SchedulerState,
};
use crate::util::clock::now_ms;
use crate::util::serde::{ItemId, SchedulerId};

/// Point-in-time view of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Item identity.
    pub id: ItemId,
    /// Lifecycle state.
    pub state: ItemState,
    /// Where the callback runs.
    pub mode: DispatchMode,
    /// Credit accrual policy.
    pub policy: AccumulationPolicy,
    /// Credit after the most recent round.
    pub credit: f64,
    /// Weight of the most recent round.
    pub last_weight: f64,
    /// Slots granted.
    pub grants: u64,
    /// Callback invocations.
    pub executions: u64,
    /// Failed invocations.
    pub failures: u64,
}

impl From<&ItemHandle> for ItemSnapshot {
    fn from(item: &ItemHandle) -> Self {
        Self {
            id: item.id(),
            state: item.state(),
            mode: item.dispatch_mode(),
            policy: item.accumulation(),
            credit: item.credit(),
            last_weight: item.last_weight(),
            grants: item.grants(),
            executions: item.executions(),
            failures: item.failures(),
        }
    }
}

/// Point-in-time view of a scheduler and its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Scheduler identity.
    pub id: SchedulerId,
    /// Lifecycle state.
    pub state: SchedulerState,
    /// Round source kind.
    pub source: RoundSourceKind,
    /// Rounds completed.
    pub rounds_completed: u64,
    /// Supplied batches not yet consumed.
    pub pending_rounds: u64,
    /// Registered items, in registration order.
    pub items: Vec<ItemSnapshot>,
    /// Capture time (ms since epoch).
    pub captured_at_ms: u128,
}

impl SchedulerSnapshot {
    /// Capture the current state of `scheduler`.
    #[must_use]
    pub fn capture(scheduler: &Scheduler) -> Self {
        Self {
            id: scheduler.id(),
            state: scheduler.state(),
            source: scheduler.source_kind(),
            rounds_completed: scheduler.rounds_completed(),
            pending_rounds: scheduler.pending_rounds(),
            items: scheduler.items().iter().map(ItemSnapshot::from).collect(),
            captured_at_ms: now_ms(),
        }
    }

    /// Sum of executions over all items.
    #[must_use]
    pub fn total_executions(&self) -> u64 {
        self.items.iter().map(|i| i.executions).sum()
    }

    /// Item by identity.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&ItemSnapshot> {
        self.items.iter().find(|i| i.id == id)
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag: the scheduler is not disposed.
    pub ok: bool,
    /// Lifecycle state.
    pub state: SchedulerState,
    /// Registered items.
    pub items: usize,
    /// Rounds completed.
    pub rounds_completed: u64,
}

/// Return a health payload for `scheduler`.
#[must_use]
pub fn health(scheduler: &Scheduler) -> Health {
    let state = scheduler.state();
    Health {
        ok: state != SchedulerState::Disposed,
        state,
        items: scheduler.len(),
        rounds_completed: scheduler.rounds_completed(),
    }
}

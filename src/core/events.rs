//! Lifecycle events and observer fan-out.
//!
//! Schedulers and items each own an [`Observers`] list. Emission is synchronous
//! and runs observers in registration order on the emitting thread; a panicking
//! observer is logged and skipped, it never unwinds into the emitter.
//!
//! | Kind        | Scheduler scope                 | Item scope                      |
//! |-------------|---------------------------------|---------------------------------|
//! | `Started`   | `start()` transition            | item `start()` transition       |
//! | `Stopped`   | `stop()` / dispose while running| item `stop()` / disposal        |
//! | `Executing` | once per round                  | once per callback invocation    |
//! | `Exception` | failed callback or weight fn    | not emitted                     |

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::util::clock::now_ms;
use crate::util::serde::{ItemId, SchedulerId};

/// Process-wide sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Scheduler or item started.
    Started,
    /// Scheduler or item stopped.
    Stopped,
    /// A round is being allocated (scheduler) or a callback is about to run (item).
    Executing,
    /// A callback failed; scheduler scope only.
    Exception,
}

/// A lifecycle notification.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event kind.
    pub kind: EventKind,
    /// Scheduler that emitted the event.
    pub scheduler: SchedulerId,
    /// Item the event concerns, if any.
    pub item: Option<ItemId>,
    /// Round number (1-based) for scheduler `Executing` events.
    pub round: Option<u64>,
    /// Slot budget of the round for scheduler `Executing` events.
    pub slots: Option<u32>,
    /// Failure carried by `Exception` events.
    pub error: Option<Arc<anyhow::Error>>,
    /// Process-wide monotonically increasing sequence number.
    pub seq: u64,
    /// Emission time in milliseconds since the Unix epoch.
    pub at_ms: u128,
}

impl Event {
    /// New event of `kind` from `scheduler`.
    #[must_use]
    pub fn new(kind: EventKind, scheduler: SchedulerId) -> Self {
        Self {
            kind,
            scheduler,
            item: None,
            round: None,
            slots: None,
            error: None,
            seq: EVENT_SEQ.fetch_add(1, Ordering::Relaxed),
            at_ms: now_ms(),
        }
    }

    /// Attach the originating item.
    #[must_use]
    pub fn with_item(mut self, item: ItemId) -> Self {
        self.item = Some(item);
        self
    }

    /// Attach round number and slot budget.
    #[must_use]
    pub fn with_round(mut self, round: u64, slots: u32) -> Self {
        self.round = Some(round);
        self.slots = Some(slots);
        self
    }

    /// Attach a failure.
    #[must_use]
    pub fn with_error(mut self, error: anyhow::Error) -> Self {
        self.error = Some(Arc::new(error));
        self
    }

    /// Failure message, if the event carries one.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.error.as_ref().map(|e| format!("{e:#}"))
    }
}

/// Observer callback.
pub type ObserverFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    observer: ObserverFn,
}

/// Ordered list of observers keyed by event kind.
pub struct Observers {
    next_id: AtomicU64,
    entries: RwLock<Vec<Subscription>>,
}

impl Observers {
    /// Empty observer list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Register `observer` for events of `kind`.
    pub fn subscribe(&self, kind: EventKind, observer: ObserverFn) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Subscription { id, kind, observer });
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|s| s.id != id);
        entries.len() != before
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deliver `event` to every observer of its kind, in registration order.
    ///
    /// The list is copied before delivery so observers may (un)subscribe from
    /// inside the callback.
    pub fn emit(&self, event: &Event) {
        let targets: Vec<ObserverFn> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|s| s.kind == event.kind)
                .map(|s| Arc::clone(&s.observer))
                .collect()
        };

        for observer in targets {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                warn!(
                    kind = ?event.kind,
                    scheduler = %event.scheduler,
                    seq = event.seq,
                    "observer panicked; continuing with remaining observers"
                );
            }
        }
    }
}

impl Default for Observers {
    fn default() -> Self {
        Self::new()
    }
}

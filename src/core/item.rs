//! Bound items: a callback together with its weight, credit and dispatch mode.

use std::ops::{BitOr, BitOrAssign};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::allocator::{AccumulationPolicy, Contender};
use crate::core::dispatcher::{panic_message, DedicatedWorker};
use crate::core::events::{Event, EventKind, Observers, SubscriptionId};
use crate::core::registry::ItemRegistry;
use crate::core::weight::WeightSource;
use crate::core::{AppResult, SchedulerError};
use crate::util::serde::{ItemId, SchedulerId};

/// User callback invoked once per granted slot.
pub type Callback = Arc<dyn Fn(ItemId) -> AppResult<()> + Send + Sync>;

/// Registration flags.
///
/// ```
/// use prometheus_slot_scheduler::core::ItemOptions;
///
/// let options = ItemOptions::INHERIT_ITEMS | ItemOptions::SEPARATE_THREAD;
/// assert!(options.contains(ItemOptions::SEPARATE_THREAD));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemOptions(u8);

impl ItemOptions {
    /// No flags: overwrite policy for dynamic weights, inline dispatch.
    pub const NONE: Self = Self(0);
    /// Dynamic weights add to leftover credit instead of replacing it.
    pub const INHERIT_ITEMS: Self = Self(1);
    /// Run the callback on a dedicated worker thread.
    pub const SEPARATE_THREAD: Self = Self(1 << 1);

    /// Raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Accrual policy these flags select for a dynamic weight.
    #[must_use]
    pub const fn accumulation(self) -> AccumulationPolicy {
        if self.contains(Self::INHERIT_ITEMS) {
            AccumulationPolicy::Accumulate
        } else {
            AccumulationPolicy::Overwrite
        }
    }

    /// Dispatch mode these flags select.
    #[must_use]
    pub const fn dispatch_mode(self) -> DispatchMode {
        if self.contains(Self::SEPARATE_THREAD) {
            DispatchMode::DedicatedWorker
        } else {
            DispatchMode::Inline
        }
    }
}

impl BitOr for ItemOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for ItemOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// Where an item's callback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Sequentially on the round loop thread.
    Inline,
    /// On a worker thread owned by the item.
    DedicatedWorker,
}

/// Item lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Takes part in rounds.
    Running,
    /// Registered but skipped by rounds.
    Stopped,
    /// Removed; terminal.
    Disposed,
}

#[derive(Debug, Default, Clone, Copy)]
struct Ledger {
    credit: f64,
    last_weight: f64,
}

/// Shared state of one bound item.
pub(crate) struct ItemCore {
    pub(crate) id: ItemId,
    pub(crate) scheduler: SchedulerId,
    weight: WeightSource,
    policy: AccumulationPolicy,
    mode: DispatchMode,
    callback: Callback,
    state: Mutex<ItemState>,
    ledger: Mutex<Ledger>,
    granted: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    pub(crate) observers: Observers,
    worker: Mutex<Option<DedicatedWorker>>,
}

impl ItemCore {
    pub(crate) fn new(
        id: ItemId,
        scheduler: SchedulerId,
        weight: WeightSource,
        options: ItemOptions,
        callback: Callback,
    ) -> Self {
        // Constant weights always carry leftover credit forward.
        let policy = if weight.is_dynamic() {
            options.accumulation()
        } else {
            AccumulationPolicy::Accumulate
        };
        Self {
            id,
            scheduler,
            weight,
            policy,
            mode: options.dispatch_mode(),
            callback,
            state: Mutex::new(ItemState::Running),
            ledger: Mutex::new(Ledger::default()),
            granted: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            observers: Observers::new(),
            worker: Mutex::new(None),
        }
    }

    pub(crate) const fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub(crate) const fn policy(&self) -> AccumulationPolicy {
        self.policy
    }

    pub(crate) fn state(&self) -> ItemState {
        *self.state.lock()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == ItemState::Running
    }

    pub(crate) fn attach_worker(&self, worker: DedicatedWorker) {
        *self.worker.lock() = Some(worker);
    }

    /// Evaluate this round's weight. A panicking weight function is reported
    /// as an error and the item sits the round out.
    pub(crate) fn evaluate_weight(&self) -> Result<f64, anyhow::Error> {
        catch_unwind(AssertUnwindSafe(|| self.weight.evaluate())).map_err(|panic| {
            anyhow::anyhow!("weight function panicked: {}", panic_message(&*panic))
        })
    }

    /// Allocator view of this item with `weight` for the current round.
    pub(crate) fn contender(&self, weight: f64) -> Contender {
        let credit = self.ledger.lock().credit;
        Contender {
            weight,
            credit,
            policy: self.policy,
            order: self.id.get(),
        }
    }

    /// Store the allocator's result for this round.
    pub(crate) fn settle(&self, contender: &Contender, granted: u32) {
        {
            let mut ledger = self.ledger.lock();
            ledger.credit = contender.credit;
            ledger.last_weight = contender.weight;
        }
        self.granted.fetch_add(u64::from(granted), Ordering::Relaxed);
    }

    /// Hand `count` grants to the dedicated worker. Returns `false` if the item
    /// has no open worker.
    pub(crate) fn submit(&self, count: u32) -> bool {
        self.worker.lock().as_ref().is_some_and(|worker| worker.submit(count))
    }

    pub(crate) fn invoke(&self) -> AppResult<()> {
        (self.callback)(self.id)
    }

    pub(crate) fn record_execution(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn transition(&self, to: ItemState) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.lock();
            if *state == ItemState::Disposed {
                return Err(SchedulerError::ItemDisposed(self.id));
            }
            if *state == to {
                return Ok(());
            }
            *state = to;
        }
        let kind = if to == ItemState::Running {
            EventKind::Started
        } else {
            EventKind::Stopped
        };
        debug!(item = %self.id, ?to, "item state changed");
        self.observers.emit(&Event::new(kind, self.scheduler).with_item(self.id));
        Ok(())
    }

    /// Mark the item disposed, close its worker and detach observers.
    ///
    /// Returns the worker thread, if any, so the caller can decide whether to
    /// wait for it. An in-flight callback is not interrupted.
    pub(crate) fn dispose(&self) -> Result<Option<JoinHandle<()>>, SchedulerError> {
        let previous = {
            let mut state = self.state.lock();
            if *state == ItemState::Disposed {
                return Err(SchedulerError::ItemDisposed(self.id));
            }
            std::mem::replace(&mut *state, ItemState::Disposed)
        };

        let worker = self.worker.lock().take().and_then(DedicatedWorker::close);
        if previous == ItemState::Running {
            self.observers
                .emit(&Event::new(EventKind::Stopped, self.scheduler).with_item(self.id));
        }
        self.observers.clear();
        debug!(item = %self.id, "item disposed");
        Ok(worker)
    }
}

/// Caller-facing handle to a registered item.
///
/// Handles are cheap to clone; every clone refers to the same item.
#[derive(Clone)]
pub struct ItemHandle {
    core: Arc<ItemCore>,
    registry: Weak<ItemRegistry>,
}

impl ItemHandle {
    pub(crate) const fn new(core: Arc<ItemCore>, registry: Weak<ItemRegistry>) -> Self {
        Self { core, registry }
    }

    /// Identity token of the item.
    #[must_use]
    pub fn id(&self) -> ItemId {
        self.core.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ItemState {
        self.core.state()
    }

    /// Whether the item currently takes part in rounds.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Where the callback runs.
    #[must_use]
    pub fn dispatch_mode(&self) -> DispatchMode {
        self.core.mode()
    }

    /// How this item's weight is combined with leftover credit.
    #[must_use]
    pub fn accumulation(&self) -> AccumulationPolicy {
        self.core.policy()
    }

    /// Credit left after the most recent round.
    #[must_use]
    pub fn credit(&self) -> f64 {
        self.core.ledger.lock().credit
    }

    /// Weight evaluated in the most recent round.
    #[must_use]
    pub fn last_weight(&self) -> f64 {
        self.core.ledger.lock().last_weight
    }

    /// Slots granted by the allocator so far.
    #[must_use]
    pub fn grants(&self) -> u64 {
        self.core.granted.load(Ordering::Relaxed)
    }

    /// Callback invocations so far, failed ones included.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.core.executed.load(Ordering::Relaxed)
    }

    /// Callback invocations that returned an error or panicked.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.core.failed.load(Ordering::Relaxed)
    }

    /// Resume taking part in rounds. Emits `Started` on transition.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ItemDisposed` once the item is disposed.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.core.transition(ItemState::Running)
    }

    /// Stop taking part in rounds; credit is kept. Emits `Stopped` on
    /// transition. Grants already handed to a worker are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ItemDisposed` once the item is disposed.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        self.core.transition(ItemState::Stopped)
    }

    /// Remove the item from its scheduler. Safe to call from the item's own
    /// callback; the running invocation is the last one.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ItemDisposed` if already disposed.
    pub fn dispose(&self) -> Result<(), SchedulerError> {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.core.id);
        }
        // The worker finishes its current callback and exits on its own.
        self.core.dispose().map(|_| ())
    }

    /// Observe `Started`, `Stopped` or `Executing` events of this item.
    ///
    /// # Errors
    ///
    /// `Exception` is scheduler-scoped and returns
    /// `SchedulerError::UnsupportedEvent`; a disposed item returns
    /// `SchedulerError::ItemDisposed`.
    pub fn subscribe<F>(
        &self,
        kind: EventKind,
        observer: F,
    ) -> Result<SubscriptionId, SchedulerError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if kind == EventKind::Exception {
            return Err(SchedulerError::UnsupportedEvent { kind });
        }
        if self.core.state() == ItemState::Disposed {
            return Err(SchedulerError::ItemDisposed(self.core.id));
        }
        Ok(self.core.observers.subscribe(kind, Arc::new(observer)))
    }

    /// Remove a subscription made with [`ItemHandle::subscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.observers.unsubscribe(id)
    }
}

impl std::fmt::Debug for ItemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemHandle")
            .field("id", &self.core.id)
            .field("state", &self.core.state())
            .field("mode", &self.core.mode)
            .finish_non_exhaustive()
    }
}

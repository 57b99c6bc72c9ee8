//! The scheduler: lifecycle, item registration and the round loop.
//!
//! One background thread per scheduler consumes rounds from its
//! [`RoundSource`], so rounds never overlap. For each round the loop
//!
//! 1. emits the scheduler `Executing` event,
//! 2. snapshots the running items and evaluates their weights,
//! 3. lets the [`SlotAllocator`] accrue credit and grant slots,
//! 4. runs inline grants in grant order and hands worker grants off.
//!
//! The loop thread is spawned by the first `start()`. `stop()` parks it on the
//! lifecycle gate; `dispose()` (or dropping the [`Scheduler`]) closes the
//! source, disposes every item and joins the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info, warn};

use crate::config::{RoundSourceConfig, SchedulerConfig};
use crate::core::allocator::{Contender, SlotAllocator};
use crate::core::dispatcher::{join_workers, DedicatedWorker, ExecutionContext};
use crate::core::events::{Event, EventKind, ObserverFn, Observers, SubscriptionId};
use crate::core::item::{Callback, DispatchMode, ItemCore, ItemHandle, ItemOptions};
use crate::core::registry::ItemRegistry;
use crate::core::rounds::{
    AutomatedRounds, Distribution, RoundSource, RoundSourceKind, SuppliedRounds,
};
use crate::core::weight::WeightSource;
use crate::core::{AppResult, SchedulerError};
use crate::runtime::api::SchedulerSnapshot;
use crate::util::serde::{ItemId, SchedulerId};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Created or stopped; rounds are not consumed.
    Stopped,
    /// Consuming rounds.
    Running,
    /// Terminal.
    Disposed,
}

pub(crate) struct Shared {
    id: SchedulerId,
    config: SchedulerConfig,
    registry: Arc<ItemRegistry>,
    observers: Arc<Observers>,
    source: Arc<dyn RoundSource>,
    gate: Mutex<SchedulerState>,
    gate_cv: Condvar,
    round_thread: Mutex<Option<JoinHandle<()>>>,
    rounds_completed: AtomicU64,
    ctx: ExecutionContext,
}

impl Shared {
    fn state(&self) -> SchedulerState {
        *self.gate.lock()
    }

    fn ensure_live(&self) -> Result<(), SchedulerError> {
        if self.state() == SchedulerState::Disposed {
            Err(SchedulerError::Disposed)
        } else {
            Ok(())
        }
    }

    fn emit(&self, kind: EventKind) {
        self.observers.emit(&Event::new(kind, self.id));
    }

    /// Block while stopped. Returns `false` once disposed.
    fn wait_until_running(&self) -> bool {
        let mut state = self.gate.lock();
        loop {
            match *state {
                SchedulerState::Running => return true,
                SchedulerState::Disposed => return false,
                SchedulerState::Stopped => self.gate_cv.wait(&mut state),
            }
        }
    }

    fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        {
            let mut state = self.gate.lock();
            match *state {
                SchedulerState::Disposed => return Err(SchedulerError::Disposed),
                SchedulerState::Running => return Ok(()),
                SchedulerState::Stopped => {}
            }
            self.source.rearm();
            *state = SchedulerState::Running;
            self.gate_cv.notify_all();
        }

        if let Err(e) = self.ensure_round_thread() {
            *self.gate.lock() = SchedulerState::Stopped;
            return Err(e);
        }
        info!(scheduler = %self.id, source = ?self.source.kind(), "scheduler started");
        self.emit(EventKind::Started);
        Ok(())
    }

    fn ensure_round_thread(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let mut slot = self.round_thread.lock();
        if slot.is_some() {
            return Ok(());
        }
        let name = format!("slot-rounds-{}", short_id(self.id));
        let shared = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || shared.round_loop())
            .map_err(|e| SchedulerError::Spawn {
                name,
                reason: e.to_string(),
            })?;
        *slot = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), SchedulerError> {
        {
            let mut state = self.gate.lock();
            match *state {
                SchedulerState::Disposed => return Err(SchedulerError::Disposed),
                SchedulerState::Stopped => return Ok(()),
                SchedulerState::Running => *state = SchedulerState::Stopped,
            }
        }
        info!(scheduler = %self.id, "scheduler stopped");
        self.emit(EventKind::Stopped);
        Ok(())
    }

    fn dispose(&self) -> Result<(), SchedulerError> {
        let previous = {
            let mut state = self.gate.lock();
            if *state == SchedulerState::Disposed {
                return Err(SchedulerError::Disposed);
            }
            let previous = std::mem::replace(&mut *state, SchedulerState::Disposed);
            self.gate_cv.notify_all();
            previous
        };
        info!(scheduler = %self.id, "disposing scheduler");

        self.source.close();

        let mut workers = Vec::new();
        for item in self.registry.close() {
            if let Ok(Some(worker)) = item.dispose() {
                workers.push(worker);
            }
        }

        let round_thread = self.round_thread.lock().take();
        if let Some(handle) = round_thread {
            // Disposing from a callback on the loop thread: the loop exits on
            // its own once the current round returns.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(scheduler = %self.id, "round loop panicked");
            }
        }

        join_workers(workers, Duration::from_millis(self.config.worker.join_grace_ms));

        if previous == SchedulerState::Running {
            self.emit(EventKind::Stopped);
        }
        self.observers.clear();
        info!(
            scheduler = %self.id,
            rounds = self.rounds_completed.load(Ordering::Relaxed),
            "scheduler disposed"
        );
        Ok(())
    }

    fn add(
        &self,
        weight: WeightSource,
        options: ItemOptions,
        callback: Callback,
    ) -> Result<ItemHandle, SchedulerError> {
        self.ensure_live()?;

        let id = self.registry.next_id();
        let core = Arc::new(ItemCore::new(id, self.id, weight, options, callback));
        if core.mode() == DispatchMode::DedicatedWorker {
            let worker =
                DedicatedWorker::spawn(&self.config.worker, Arc::clone(&core), self.ctx.clone())?;
            core.attach_worker(worker);
        }

        if let Err(e) = self.registry.insert(Arc::clone(&core)) {
            let _ = core.dispose();
            return Err(e);
        }
        debug!(
            scheduler = %self.id,
            item = %id,
            mode = ?core.mode(),
            policy = ?core.policy(),
            "item registered"
        );
        Ok(ItemHandle::new(core, Arc::downgrade(&self.registry)))
    }

    fn remove(&self, id: ItemId) -> Result<(), SchedulerError> {
        self.ensure_live()?;
        let item = self.registry.remove(id).ok_or(SchedulerError::UnknownItem(id))?;
        // Worker threads are left to finish their current callback.
        item.dispose().map(|_| ())
    }

    fn supply(&self, slots: u32) -> Result<(), SchedulerError> {
        self.ensure_live()?;
        self.source.supply(slots)
    }

    fn attach(
        &self,
        kind: EventKind,
        observer: ObserverFn,
    ) -> Result<SubscriptionId, SchedulerError> {
        self.ensure_live()?;
        Ok(self.observers.subscribe(kind, observer))
    }

    fn round_loop(&self) {
        debug!(scheduler = %self.id, "round loop started");
        loop {
            if !self.wait_until_running() {
                break;
            }
            let Some(slots) = self.source.next_round() else {
                break;
            };

            match self.state() {
                SchedulerState::Running => {}
                SchedulerState::Disposed => break,
                SchedulerState::Stopped => match self.source.kind() {
                    // Supplied batches are never lost; hold this one until resumed.
                    RoundSourceKind::Supplied => {
                        if !self.wait_until_running() {
                            break;
                        }
                    }
                    RoundSourceKind::Automated => continue,
                },
            }

            self.run_round(slots);
        }
        debug!(scheduler = %self.id, "round loop exited");
    }

    fn run_round(&self, slots: u32) {
        let round = self.rounds_completed.load(Ordering::Relaxed) + 1;
        let span = debug_span!("round", scheduler = %self.id, round, slots);
        let _enter = span.enter();

        self.observers
            .emit(&Event::new(EventKind::Executing, self.id).with_round(round, slots));

        let items = self.registry.active_snapshot();
        let mut contenders: Vec<Contender> = items
            .iter()
            .map(|item| {
                let weight = item.evaluate_weight().unwrap_or_else(|err| {
                    self.ctx.report_failure(item, err);
                    0.0
                });
                item.contender(weight)
            })
            .collect();

        let allocation = match self.source.distribution() {
            Distribution::SinglePass => SlotAllocator::allocate(&mut contenders, slots),
            Distribution::Exhaustive => SlotAllocator::allocate_exhaustive(
                &mut contenders,
                slots,
                self.config.max_passes_per_round,
            ),
        };
        for ((item, contender), count) in items.iter().zip(&contenders).zip(&allocation.counts) {
            item.settle(contender, *count);
        }
        debug!(
            items = items.len(),
            granted = allocation.granted,
            passes = allocation.passes,
            "round allocated"
        );

        for (item, count) in items.iter().zip(&allocation.counts) {
            if *count > 0 && item.mode() == DispatchMode::DedicatedWorker && !item.submit(*count) {
                debug!(item = %item.id, "worker closed, grants dropped");
            }
        }
        for &index in &allocation.sequence {
            let item = &items[index];
            if item.mode() == DispatchMode::Inline && item.is_running() {
                self.ctx.execute_once(item);
            }
        }

        self.rounds_completed.fetch_add(1, Ordering::Relaxed);
    }
}

fn short_id(id: SchedulerId) -> String {
    id.0.simple().to_string().chars().take(8).collect()
}

/// Weighted slot scheduler.
///
/// Dropping a scheduler disposes it.
///
/// ```
/// use prometheus_slot_scheduler::core::Scheduler;
///
/// let scheduler = Scheduler::new_supplied();
/// let item = scheduler.add(1.0, |_| Ok(())).unwrap();
/// scheduler.start().unwrap();
/// scheduler.supply(3).unwrap();
/// scheduler.dispose().unwrap();
/// assert!(!item.is_running());
/// ```
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Timer-driven scheduler producing `slots_per_period` slots every
    /// `period_ms` milliseconds once started.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if either value is zero.
    pub fn new_automated(period_ms: u64, slots_per_period: u32) -> Result<Self, SchedulerError> {
        Self::with_config(SchedulerConfig::automated(period_ms, slots_per_period))
    }

    /// Scheduler fed by [`Scheduler::supply`].
    #[must_use]
    pub fn new_supplied() -> Self {
        Self::from_parts(SchedulerConfig::supplied(), Arc::new(SuppliedRounds::new()))
    }

    /// Scheduler built from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if validation fails.
    pub fn with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let source: Arc<dyn RoundSource> = match config.rounds {
            RoundSourceConfig::Automated {
                period_ms,
                slots_per_period,
            } => Arc::new(AutomatedRounds::new(
                Duration::from_millis(period_ms),
                slots_per_period,
            )?),
            RoundSourceConfig::Supplied => Arc::new(SuppliedRounds::new()),
        };
        Ok(Self::from_parts(config, source))
    }

    fn from_parts(config: SchedulerConfig, source: Arc<dyn RoundSource>) -> Self {
        let id = SchedulerId::new();
        let observers = Arc::new(Observers::new());
        debug!(scheduler = %id, source = ?source.kind(), "scheduler created");
        Self {
            shared: Arc::new(Shared {
                id,
                config,
                registry: Arc::new(ItemRegistry::new()),
                observers: Arc::clone(&observers),
                source,
                gate: Mutex::new(SchedulerState::Stopped),
                gate_cv: Condvar::new(),
                round_thread: Mutex::new(None),
                rounds_completed: AtomicU64::new(0),
                ctx: ExecutionContext::new(id, observers),
            }),
        }
    }

    /// Scheduler identity.
    #[must_use]
    pub fn id(&self) -> SchedulerId {
        self.shared.id
    }

    /// Configuration the scheduler was built with.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Kind of round source.
    #[must_use]
    pub fn source_kind(&self) -> RoundSourceKind {
        self.shared.source.kind()
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Rounds fully allocated and dispatched so far.
    #[must_use]
    pub fn rounds_completed(&self) -> u64 {
        self.shared.rounds_completed.load(Ordering::Relaxed)
    }

    /// Supplied batches waiting for the round loop.
    #[must_use]
    pub fn pending_rounds(&self) -> u64 {
        self.shared.source.pending()
    }

    /// Weak handle for use inside callbacks.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Register a callback with a constant weight.
    ///
    /// # Errors
    ///
    /// `InvalidWeight` for negative or non-finite weights, `Disposed` after
    /// dispose.
    pub fn add<F>(&self, weight: f64, callback: F) -> Result<ItemHandle, SchedulerError>
    where
        F: Fn(ItemId) -> AppResult<()> + Send + Sync + 'static,
    {
        self.add_with_options(weight, ItemOptions::NONE, callback)
    }

    /// Register a callback with a constant weight and options.
    ///
    /// # Errors
    ///
    /// `InvalidWeight` for negative or non-finite weights, `Disposed` after
    /// dispose, `Spawn` if a dedicated worker cannot be started.
    pub fn add_with_options<F>(
        &self,
        weight: f64,
        options: ItemOptions,
        callback: F,
    ) -> Result<ItemHandle, SchedulerError>
    where
        F: Fn(ItemId) -> AppResult<()> + Send + Sync + 'static,
    {
        self.add_source(WeightSource::constant(weight)?, options, Arc::new(callback))
    }

    /// Register a callback whose weight is re-evaluated every round.
    ///
    /// # Errors
    ///
    /// `Disposed` after dispose.
    pub fn add_dynamic<W, F>(&self, weight: W, callback: F) -> Result<ItemHandle, SchedulerError>
    where
        W: Fn() -> f64 + Send + Sync + 'static,
        F: Fn(ItemId) -> AppResult<()> + Send + Sync + 'static,
    {
        self.add_dynamic_with_options(weight, ItemOptions::NONE, callback)
    }

    /// Register a dynamically weighted callback with options.
    ///
    /// # Errors
    ///
    /// `Disposed` after dispose, `Spawn` if a dedicated worker cannot be
    /// started.
    pub fn add_dynamic_with_options<W, F>(
        &self,
        weight: W,
        options: ItemOptions,
        callback: F,
    ) -> Result<ItemHandle, SchedulerError>
    where
        W: Fn() -> f64 + Send + Sync + 'static,
        F: Fn(ItemId) -> AppResult<()> + Send + Sync + 'static,
    {
        self.add_source(WeightSource::dynamic(weight), options, Arc::new(callback))
    }

    /// Register a callback with an explicit weight source.
    ///
    /// # Errors
    ///
    /// `Disposed` after dispose, `Spawn` if a dedicated worker cannot be
    /// started.
    pub fn add_source(
        &self,
        weight: WeightSource,
        options: ItemOptions,
        callback: Callback,
    ) -> Result<ItemHandle, SchedulerError> {
        self.shared.add(weight, options, callback)
    }

    /// Dispose one item.
    ///
    /// # Errors
    ///
    /// `UnknownItem` if `id` is not registered, `Disposed` after dispose.
    pub fn remove(&self, id: ItemId) -> Result<(), SchedulerError> {
        self.shared.remove(id)
    }

    /// Handle of a registered item.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<ItemHandle> {
        self.shared
            .registry
            .get(id)
            .map(|core| ItemHandle::new(core, Arc::downgrade(&self.shared.registry)))
    }

    /// Handles of every registered item, in registration order.
    #[must_use]
    pub fn items(&self) -> Vec<ItemHandle> {
        self.shared
            .registry
            .all()
            .into_iter()
            .map(|core| ItemHandle::new(core, Arc::downgrade(&self.shared.registry)))
            .collect()
    }

    /// Number of registered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.registry.len()
    }

    /// Whether no item is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Begin (or resume) consuming rounds. Emits `Started` on transition.
    ///
    /// # Errors
    ///
    /// `Disposed` after dispose, `Spawn` if the round loop cannot be started.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.shared.start()
    }

    /// Pause round consumption. Emits `Stopped` on transition.
    ///
    /// # Errors
    ///
    /// `Disposed` after dispose.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        self.shared.stop()
    }

    /// Queue a batch of `slots` as one round.
    ///
    /// # Errors
    ///
    /// `InvalidSupply` for zero, `SupplyUnsupported` on a timer-driven
    /// scheduler, `Disposed` after dispose.
    pub fn supply(&self, slots: u32) -> Result<(), SchedulerError> {
        self.shared.supply(slots)
    }

    /// Dispose every item and shut the round loop down.
    ///
    /// Blocks until in-flight inline work finishes, unless called from a
    /// callback on the loop thread. Dedicated workers get the configured
    /// grace period before they are detached.
    ///
    /// # Errors
    ///
    /// `Disposed` if already disposed.
    pub fn dispose(&self) -> Result<(), SchedulerError> {
        self.shared.dispose()
    }

    /// Observe scheduler events of `kind`.
    ///
    /// # Errors
    ///
    /// `Disposed` after dispose.
    pub fn subscribe<F>(
        &self,
        kind: EventKind,
        observer: F,
    ) -> Result<SubscriptionId, SchedulerError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.attach(kind, Arc::new(observer))
    }

    /// Observe scheduler events with a shared observer.
    ///
    /// # Errors
    ///
    /// `Disposed` after dispose.
    pub fn attach(
        &self,
        kind: EventKind,
        observer: ObserverFn,
    ) -> Result<SubscriptionId, SchedulerError> {
        self.shared.attach(kind, observer)
    }

    /// Remove a scheduler subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.observers.unsubscribe(id)
    }

    /// Serializable view of the scheduler and its items.
    #[must_use]
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot::capture(self)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.shared.state() != SchedulerState::Disposed {
            let _ = self.shared.dispose();
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("source", &self.source_kind())
            .field("items", &self.len())
            .finish_non_exhaustive()
    }
}

/// Non-owning reference to a scheduler, safe to move into callbacks.
///
/// Every operation reports `Disposed` once the scheduler is gone.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Weak<Shared>,
}

impl SchedulerHandle {
    fn upgrade(&self) -> Result<Arc<Shared>, SchedulerError> {
        self.shared.upgrade().ok_or(SchedulerError::Disposed)
    }

    /// See [`Scheduler::remove`].
    ///
    /// # Errors
    ///
    /// `UnknownItem` if `id` is not registered, `Disposed` after dispose.
    pub fn remove(&self, id: ItemId) -> Result<(), SchedulerError> {
        self.upgrade()?.remove(id)
    }

    /// See [`Scheduler::supply`].
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::supply`].
    pub fn supply(&self, slots: u32) -> Result<(), SchedulerError> {
        self.upgrade()?.supply(slots)
    }

    /// See [`Scheduler::start`].
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::start`].
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.upgrade()?.start()
    }

    /// See [`Scheduler::stop`].
    ///
    /// # Errors
    ///
    /// `Disposed` after dispose.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        self.upgrade()?.stop()
    }

    /// See [`Scheduler::unsubscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.observers.unsubscribe(id))
    }

    /// Lifecycle state; `Disposed` once the scheduler is gone.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.shared
            .upgrade()
            .map_or(SchedulerState::Disposed, |shared| shared.state())
    }

    /// Whether the scheduler has been disposed or dropped.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state() == SchedulerState::Disposed
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("state", &self.state())
            .finish()
    }
}

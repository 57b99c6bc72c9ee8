//! Core scheduling: weights, credit allocation, round sources, dispatch and events.

pub mod allocator;
pub(crate) mod dispatcher;
pub mod error;
pub mod events;
pub mod item;
pub mod journal;
pub(crate) mod registry;
pub mod rounds;
pub mod scheduler;
pub mod weight;

pub use allocator::{AccumulationPolicy, Allocation, Contender, SlotAllocator, CREDIT_EPSILON};
pub use error::{AppResult, SchedulerError};
pub use events::{Event, EventKind, ObserverFn, Observers, SubscriptionId};
pub use item::{Callback, DispatchMode, ItemHandle, ItemOptions, ItemState};
pub use journal::{EventJournal, EventRecord};
pub use rounds::{AutomatedRounds, Distribution, RoundSource, RoundSourceKind, SuppliedRounds};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState};
pub use weight::{effective_weight, WeightFn, WeightSource};

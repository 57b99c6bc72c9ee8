//! # Prometheus Slot Scheduler
//!
//! A weighted slot scheduler: discrete execution slots are produced by a timer
//! or supplied in batches, and each round they are divided among registered
//! callbacks in proportion to per-callback weights.
//!
//! ## Core Problem Solved
//!
//! Many background jobs compete for a budget that arrives in rounds: a fixed
//! number of calls per second against a rate-limited API, tokens released by an
//! upstream throttle, a batch of work units handed over by a coordinator. The
//! scheduler decides, round by round, who runs and how often:
//!
//! - **Proportional throughput**: under saturation each item's long-run share
//!   converges to its weight over the total weight
//! - **Fractional weights**: a weight of `0.25` runs once every four rounds
//! - **Bounded bursts**: an item never runs more often in a round than the round
//!   has slots
//! - **Dynamic demand**: weights may be functions re-evaluated every round
//!
//! ## Architecture
//!
//! ```text
//!  AutomatedRounds ─┐                       ┌─> inline callbacks (loop thread)
//!                   ├─> round loop ─> SlotAllocator ─┤
//!  SuppliedRounds ──┘        │                       └─> DedicatedWorker threads
//!                            └─> Observers (Started / Stopped / Executing / Exception)
//! ```
//!
//! Each item carries a credit. Every round it accrues its weight, then slots
//! are granted one at a time to the eligible item furthest behind its share.
//! Supplied batches are spent exhaustively; timer rounds discard slots nobody
//! is eligible for.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! use prometheus_slot_scheduler::core::{ItemOptions, Scheduler};
//!
//! let scheduler = Scheduler::new_supplied();
//! let runs = Arc::new(AtomicU64::new(0));
//!
//! let counter = Arc::clone(&runs);
//! let item = scheduler
//!     .add_with_options(2.0, ItemOptions::NONE, move |_id| {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! scheduler.start().unwrap();
//! scheduler.supply(10).unwrap();
//! scheduler.dispose().unwrap();
//! assert!(item.grants() <= 10);
//! ```
//!
//! For complete scenarios, see `tests/scheduler_scenarios_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling: weights, credit allocation, round sources, dispatch and events.
pub mod core;
/// Configuration models for schedulers, round sources and worker threads.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Snapshots, health and the async event stream.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::config::SchedulerConfig;
pub use crate::core::{
    AppResult, Event, EventKind, ItemHandle, ItemOptions, Scheduler, SchedulerError,
    SchedulerHandle, SchedulerState,
};
pub use crate::util::serde::{ItemId, SchedulerId};

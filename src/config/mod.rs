//! Configuration models for schedulers, round sources, and worker threads.

pub mod scheduler;

pub use scheduler::{RoundSourceConfig, SchedulerConfig, WorkerConfig, ENV_PREFIX};

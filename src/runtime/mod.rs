//! Host-facing surface: serializable snapshots and, with the `tokio-runtime`
//! feature, an async event stream.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod event_stream;

pub use api::{health, Health, ItemSnapshot, SchedulerSnapshot};
#[cfg(feature = "tokio-runtime")]
pub use event_stream::{event_stream, EventStream};

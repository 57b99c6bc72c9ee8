//! Execution dispatch: invoking callbacks inline or on dedicated workers.
//!
//! Every invocation crosses a fault boundary. An `Err` return or a panic is
//! counted on the item, logged, and reported as a scheduler `Exception` event;
//! neither reaches the round loop nor stops the item from being granted
//! further slots.
//!
//! Dedicated workers follow the usual channel-fed thread shape: the worker
//! blocks on `recv` while its backlog is empty and exits when the sending side
//! is dropped. The backlog is unbounded, so a callback slower than its grant
//! rate grows it without limit.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Sender};
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::core::events::{Event, EventKind, Observers};
use crate::core::item::ItemCore;
use crate::core::SchedulerError;
use crate::util::serde::SchedulerId;

/// Render a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// What a dispatch needs to know about its scheduler.
#[derive(Clone)]
pub(crate) struct ExecutionContext {
    pub(crate) scheduler: SchedulerId,
    pub(crate) observers: Arc<Observers>,
}

impl ExecutionContext {
    pub(crate) const fn new(scheduler: SchedulerId, observers: Arc<Observers>) -> Self {
        Self { scheduler, observers }
    }

    /// Invoke the item's callback once, isolating failures.
    pub(crate) fn execute_once(&self, item: &ItemCore) {
        item.observers
            .emit(&Event::new(EventKind::Executing, self.scheduler).with_item(item.id));

        let outcome = catch_unwind(AssertUnwindSafe(|| item.invoke()));
        item.record_execution();
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(panic) => anyhow::anyhow!("callback panicked: {}", panic_message(&*panic)),
        };
        item.record_failure();
        self.report_failure(item, error);
    }

    /// Surface a failure on the scheduler's `Exception` event.
    pub(crate) fn report_failure(&self, item: &ItemCore, error: anyhow::Error) {
        warn!(
            scheduler = %self.scheduler,
            item = %item.id,
            error = %format!("{error:#}"),
            "item failed"
        );
        self.observers.emit(
            &Event::new(EventKind::Exception, self.scheduler)
                .with_item(item.id)
                .with_error(error),
        );
    }

    /// Run up to `count` invocations, stopping as soon as the item is no
    /// longer running. Returns the number of invocations made.
    pub(crate) fn run_grants(&self, item: &ItemCore, count: u32) -> u32 {
        let mut ran = 0;
        while ran < count && item.is_running() {
            self.execute_once(item);
            ran += 1;
        }
        ran
    }
}

/// Worker thread owned by one item.
pub(crate) struct DedicatedWorker {
    tx: Sender<u32>,
    handle: JoinHandle<()>,
}

impl DedicatedWorker {
    /// Start the worker for `item`.
    pub(crate) fn spawn(
        config: &WorkerConfig,
        item: Arc<ItemCore>,
        ctx: ExecutionContext,
    ) -> Result<Self, SchedulerError> {
        let (tx, rx) = unbounded::<u32>();
        let name = format!("{}-{}", config.thread_name_prefix, item.id.get());
        let item_id = item.id;

        let handle = thread::Builder::new()
            .name(name.clone())
            .stack_size(config.thread_stack_size)
            .spawn(move || {
                debug!(item = %item_id, "worker started");
                // Sender dropped on dispose: recv fails and the loop ends.
                while let Ok(count) = rx.recv() {
                    let ran = ctx.run_grants(&item, count);
                    if ran < count {
                        debug!(
                            item = %item_id,
                            dropped = count - ran,
                            "grants dropped, item not running"
                        );
                    }
                }
                debug!(item = %item_id, "worker channel closed, exiting");
            })
            .map_err(|e| SchedulerError::Spawn {
                name,
                reason: e.to_string(),
            })?;

        Ok(Self { tx, handle })
    }

    /// Queue `count` grants. Returns `false` if the worker has exited.
    pub(crate) fn submit(&self, count: u32) -> bool {
        self.tx.send(count).is_ok()
    }

    /// Close the backlog; returns the thread unless called from the worker
    /// itself.
    pub(crate) fn close(self) -> Option<JoinHandle<()>> {
        let Self { tx, handle } = self;
        drop(tx);
        if handle.thread().id() == thread::current().id() {
            None
        } else {
            Some(handle)
        }
    }
}

/// Wait for worker threads until `grace` has elapsed, then detach the rest.
pub(crate) fn join_workers(handles: Vec<JoinHandle<()>>, grace: Duration) {
    if handles.is_empty() {
        return;
    }
    let deadline = Instant::now() + grace;

    for handle in handles {
        let name = handle.thread().name().unwrap_or("worker").to_owned();
        let (done_tx, done_rx) = bounded(1);
        let reaper = thread::Builder::new()
            .name(format!("{name}-join"))
            .spawn(move || {
                let _ = done_tx.send(handle.join().is_ok());
            });
        if let Err(e) = reaper {
            warn!(worker = %name, error = %e, "could not wait for worker, detaching");
            continue;
        }

        match done_rx.recv_deadline(deadline) {
            Ok(true) => debug!(worker = %name, "worker joined"),
            Ok(false) => warn!(worker = %name, "worker panicked"),
            Err(_) => warn!(worker = %name, "worker did not exit within grace period, detaching"),
        }
    }
}

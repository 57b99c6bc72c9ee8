//! Async event stream backed by a tokio channel.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::core::{Event, EventKind, Scheduler, SchedulerError, SchedulerHandle, SubscriptionId};

/// Scheduler events delivered to async code.
///
/// Observers run on scheduler threads and only enqueue, so a slow consumer
/// never delays the round loop. Dropping the stream unsubscribes it.
pub struct EventStream {
    rx: UnboundedReceiver<Event>,
    scheduler: SchedulerHandle,
    subscriptions: Vec<SubscriptionId>,
}

impl EventStream {
    /// Next event; `None` once the scheduler is disposed and the backlog drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.scheduler.unsubscribe(id);
        }
    }
}

/// Stream scheduler events of the given kinds.
///
/// # Errors
///
/// Returns `SchedulerError::Disposed` if the scheduler is disposed.
pub fn event_stream(
    scheduler: &Scheduler,
    kinds: &[EventKind],
) -> Result<EventStream, SchedulerError> {
    let (tx, rx) = unbounded_channel();
    let mut subscriptions = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        let tx = tx.clone();
        let subscribed = scheduler.subscribe(kind, move |event: &Event| {
            let _ = tx.send(event.clone());
        });
        match subscribed {
            Ok(id) => subscriptions.push(id),
            Err(e) => {
                for id in subscriptions {
                    scheduler.unsubscribe(id);
                }
                return Err(e);
            }
        }
    }
    Ok(EventStream {
        rx,
        scheduler: scheduler.handle(),
        subscriptions,
    })
}

//! Bounded in-memory event journal.
//!
//! Hosts that prefer reading events back over reacting to them can attach an
//! [`EventJournal`] as an observer; it keeps the most recent `max_events`
//! records and drops the oldest on overflow.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::events::{Event, EventKind, ObserverFn};
use crate::util::serde::{ItemId, SchedulerId};

/// Serializable copy of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Process-wide sequence number.
    pub seq: u64,
    /// Event kind.
    pub kind: EventKind,
    /// Emitting scheduler.
    pub scheduler: SchedulerId,
    /// Originating item.
    pub item: Option<ItemId>,
    /// Round number for scheduler `Executing` events.
    pub round: Option<u64>,
    /// Failure message for `Exception` events.
    pub reason: Option<String>,
    /// Timestamp milliseconds.
    pub at_ms: u128,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        Self {
            seq: event.seq,
            kind: event.kind,
            scheduler: event.scheduler,
            item: event.item,
            round: event.round,
            reason: event.reason(),
            at_ms: event.at_ms,
        }
    }
}

/// Ring buffer of recent events.
pub struct EventJournal {
    events: Mutex<VecDeque<EventRecord>>,
    max_events: usize,
}

impl EventJournal {
    /// Create a journal keeping at most `max_events` records.
    #[must_use]
    pub fn new(max_events: usize) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        })
    }

    /// Record an event, evicting the oldest record when full.
    pub fn record(&self, event: &Event) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(EventRecord::from(event));
    }

    /// Snapshot of stored records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<EventRecord> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored records of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: EventKind) -> Vec<EventRecord> {
        self.events.lock().iter().filter(|r| r.kind == kind).cloned().collect()
    }

    /// Number of stored records of one kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|r| r.kind == kind).count()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether the journal is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Observer that records into this journal.
    #[must_use]
    pub fn observer(self: &Arc<Self>) -> ObserverFn {
        let journal = Arc::clone(self);
        Arc::new(move |event: &Event| journal.record(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_overflow_keeps_latest() {
        let journal = EventJournal::new(2);
        let sid = SchedulerId::new();
        journal.record(&Event::new(EventKind::Started, sid));
        journal.record(&Event::new(EventKind::Executing, sid).with_round(1, 4));
        journal.record(&Event::new(EventKind::Stopped, sid));

        let records = journal.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, EventKind::Executing);
        assert_eq!(records[0].round, Some(1));
        assert_eq!(records[1].kind, EventKind::Stopped);
    }

    #[test]
    fn test_journal_as_observer() {
        let journal = EventJournal::new(16);
        let observer = journal.observer();
        let ev = Event::new(EventKind::Exception, SchedulerId::new())
            .with_item(ItemId(3))
            .with_error(anyhow::anyhow!("callback failed"));
        observer(&ev);

        assert_eq!(journal.count(EventKind::Exception), 1);
        let record = &journal.of_kind(EventKind::Exception)[0];
        assert_eq!(record.item, Some(ItemId(3)));
        assert_eq!(record.reason.as_deref(), Some("callback failed"));
    }
}

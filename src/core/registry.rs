//! Registration-ordered item registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::item::ItemCore;
use crate::core::SchedulerError;
use crate::util::serde::ItemId;

struct Entries {
    items: Vec<Arc<ItemCore>>,
    closed: bool,
}

/// Thread-safe collection of the items bound to one scheduler.
///
/// Items are kept in registration order, which is also the allocator's final
/// tie-break. Snapshots are taken under the read lock, so an item added while
/// a round is being prepared is either fully in it or not at all.
pub(crate) struct ItemRegistry {
    entries: RwLock<Entries>,
    next_id: AtomicU64,
}

impl ItemRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Entries {
                items: Vec::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Reserve the next identity; never reused for this registry.
    pub(crate) fn next_id(&self) -> ItemId {
        ItemId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn insert(&self, item: Arc<ItemCore>) -> Result<(), SchedulerError> {
        let mut entries = self.entries.write();
        if entries.closed {
            return Err(SchedulerError::Disposed);
        }
        entries.items.push(item);
        Ok(())
    }

    pub(crate) fn remove(&self, id: ItemId) -> Option<Arc<ItemCore>> {
        let mut entries = self.entries.write();
        let index = entries.items.iter().position(|item| item.id == id)?;
        Some(entries.items.remove(index))
    }

    pub(crate) fn get(&self, id: ItemId) -> Option<Arc<ItemCore>> {
        self.entries.read().items.iter().find(|item| item.id == id).cloned()
    }

    pub(crate) fn all(&self) -> Vec<Arc<ItemCore>> {
        self.entries.read().items.clone()
    }

    /// Running items, in registration order.
    pub(crate) fn active_snapshot(&self) -> Vec<Arc<ItemCore>> {
        self.entries
            .read()
            .items
            .iter()
            .filter(|item| item.is_running())
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().items.len()
    }

    /// Reject further inserts and hand back every registered item.
    pub(crate) fn close(&self) -> Vec<Arc<ItemCore>> {
        let mut entries = self.entries.write();
        entries.closed = true;
        std::mem::take(&mut entries.items)
    }
}

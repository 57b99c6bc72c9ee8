//! Externally supplied round source.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use super::{Distribution, RoundSource, RoundSourceKind};
use crate::core::SchedulerError;

/// Unbounded FIFO of slot batches; each batch becomes exactly one round.
///
/// The consuming loop blocks on the channel while it is empty. Concurrent
/// `supply` calls are serialized by the channel in arrival order.
pub struct SuppliedRounds {
    /// Dropped on close so a blocked receiver wakes up.
    tx: Mutex<Option<Sender<u32>>>,
    rx: Receiver<u32>,
    closed: AtomicBool,
    pending: AtomicU64,
}

impl SuppliedRounds {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            closed: AtomicBool::new(false),
            pending: AtomicU64::new(0),
        }
    }
}

impl Default for SuppliedRounds {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundSource for SuppliedRounds {
    fn next_round(&self) -> Option<u32> {
        let Ok(slots) = self.rx.recv() else {
            debug!("supplied round source closed");
            return None;
        };
        self.pending.fetch_sub(1, Ordering::Relaxed);
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(slots)
    }

    fn kind(&self) -> RoundSourceKind {
        RoundSourceKind::Supplied
    }

    fn distribution(&self) -> Distribution {
        Distribution::Exhaustive
    }

    fn supply(&self, slots: u32) -> Result<(), SchedulerError> {
        if slots == 0 {
            return Err(SchedulerError::InvalidSupply(slots));
        }
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(SchedulerError::Disposed);
        };
        // Count before sending so the consumer never decrements below zero.
        self.pending.fetch_add(1, Ordering::Relaxed);
        if tx.send(slots).is_err() {
            self.pending.fetch_sub(1, Ordering::Relaxed);
            return Err(SchedulerError::Disposed);
        }
        debug!(slots, "slot batch supplied");
        Ok(())
    }

    fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.tx.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_batches_arrive_in_order_unmerged() {
        let source = SuppliedRounds::new();
        source.supply(5).unwrap();
        source.supply(1).unwrap();
        source.supply(9).unwrap();
        assert_eq!(source.pending(), 3);

        assert_eq!(source.next_round(), Some(5));
        assert_eq!(source.next_round(), Some(1));
        assert_eq!(source.next_round(), Some(9));
        assert_eq!(source.pending(), 0);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let source = SuppliedRounds::new();
        assert!(matches!(source.supply(0), Err(SchedulerError::InvalidSupply(0))));
        assert_eq!(source.pending(), 0);
    }

    #[test]
    fn test_blocks_until_supplied() {
        let source = Arc::new(SuppliedRounds::new());
        let consumer = {
            let source = Arc::clone(&source);
            thread::spawn(move || source.next_round())
        };
        thread::sleep(Duration::from_millis(20));
        source.supply(7).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn test_close_rejects_and_unblocks() {
        let source = Arc::new(SuppliedRounds::new());
        let consumer = {
            let source = Arc::clone(&source);
            thread::spawn(move || source.next_round())
        };
        thread::sleep(Duration::from_millis(20));
        source.close();
        assert_eq!(consumer.join().unwrap(), None);
        assert!(matches!(source.supply(1), Err(SchedulerError::Disposed)));
    }

    #[test]
    fn test_queued_batches_dropped_after_close() {
        let source = SuppliedRounds::new();
        source.supply(4).unwrap();
        source.close();
        assert_eq!(source.next_round(), None);
    }
}

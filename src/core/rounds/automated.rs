//! Timer-driven round source.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::debug;

use super::{Distribution, RoundSource, RoundSourceKind};
use crate::core::SchedulerError;

/// Fires one round of `slots` every `period`.
///
/// Firings are best effort: if a round outlasts the period the next one fires
/// as soon as the loop asks for it, and missed firings are not made up.
pub struct AutomatedRounds {
    period: Duration,
    slots: u32,
    next_tick: Mutex<Option<Instant>>,
    /// Dropped on close to wake the waiting loop.
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
}

impl AutomatedRounds {
    /// Create a timer source.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `period` or `slots` is zero.
    pub fn new(period: Duration, slots: u32) -> Result<Self, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidConfig("period must be greater than 0".into()));
        }
        if slots == 0 {
            return Err(SchedulerError::InvalidConfig(
                "slots_per_period must be greater than 0".into(),
            ));
        }
        let (shutdown_tx, shutdown_rx) = bounded(0);
        Ok(Self {
            period,
            slots,
            next_tick: Mutex::new(None),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
        })
    }

    /// Firing period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Slots per firing.
    #[must_use]
    pub const fn slots(&self) -> u32 {
        self.slots
    }
}

impl RoundSource for AutomatedRounds {
    fn next_round(&self) -> Option<u32> {
        let deadline = {
            let mut next = self.next_tick.lock();
            let now = Instant::now();
            let due = next.map_or(now + self.period, |t| t.max(now));
            *next = Some(due + self.period);
            due
        };

        match self.shutdown_rx.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => Some(self.slots),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("automated round source closed");
                None
            }
        }
    }

    fn kind(&self) -> RoundSourceKind {
        RoundSourceKind::Automated
    }

    fn distribution(&self) -> Distribution {
        Distribution::SinglePass
    }

    fn rearm(&self) {
        *self.next_tick.lock() = None;
    }

    fn close(&self) {
        self.shutdown_tx.lock().take();
    }
}

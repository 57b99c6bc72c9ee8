//! Builders to construct schedulers from configuration.

use std::collections::HashMap;

use crate::config::SchedulerConfig;
use crate::core::{EventKind, ObserverFn, Scheduler, SchedulerError};

/// Assembles a [`Scheduler`] with observers attached before it can emit.
///
/// ```
/// use prometheus_slot_scheduler::builders::SchedulerBuilder;
/// use prometheus_slot_scheduler::config::SchedulerConfig;
/// use prometheus_slot_scheduler::core::{EventJournal, EventKind};
///
/// let journal = EventJournal::new(64);
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::supplied())
///     .observe(EventKind::Started, journal.observer())
///     .build()
///     .unwrap();
/// scheduler.start().unwrap();
/// assert_eq!(journal.count(EventKind::Started), 1);
/// ```
#[derive(Clone)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    observers: Vec<(EventKind, ObserverFn)>,
}

impl SchedulerBuilder {
    /// Start from `config`.
    #[must_use]
    pub const fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            observers: Vec::new(),
        }
    }

    /// Attach `observer` to scheduler events of `kind`.
    #[must_use]
    pub fn observe(mut self, kind: EventKind, observer: ObserverFn) -> Self {
        self.observers.push((kind, observer));
        self
    }

    /// Attach `observer` to every scheduler event kind.
    #[must_use]
    pub fn observe_all(mut self, observer: &ObserverFn) -> Self {
        for kind in [
            EventKind::Started,
            EventKind::Stopped,
            EventKind::Executing,
            EventKind::Exception,
        ] {
            self.observers.push((kind, ObserverFn::clone(observer)));
        }
        self
    }

    /// Validate the configuration and build the scheduler (stopped).
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if validation fails.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        let scheduler = Scheduler::with_config(self.config)?;
        for (kind, observer) in self.observers {
            scheduler.attach(kind, observer)?;
        }
        Ok(scheduler)
    }
}

/// Build one stopped scheduler per named configuration.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidConfig` naming the first invalid entry.
pub fn build_schedulers(
    configs: &HashMap<String, SchedulerConfig>,
) -> Result<HashMap<String, Scheduler>, SchedulerError> {
    let mut schedulers = HashMap::with_capacity(configs.len());
    for (name, cfg) in configs {
        cfg.validate().map_err(|e| {
            SchedulerError::InvalidConfig(format!("scheduler `{name}` invalid: {e}"))
        })?;
        schedulers.insert(name.clone(), Scheduler::with_config(cfg.clone())?);
    }
    Ok(schedulers)
}

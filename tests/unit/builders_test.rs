//! Tests for builder modules

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use prometheus_slot_scheduler::builders::{build_schedulers, SchedulerBuilder};
use prometheus_slot_scheduler::config::SchedulerConfig;
use prometheus_slot_scheduler::core::{
    Event, EventJournal, EventKind, ObserverFn, RoundSourceKind, SchedulerError, SchedulerState,
};

#[test]
fn test_builder_attaches_observers() {
    let journal = EventJournal::new(16);
    let scheduler = SchedulerBuilder::new(SchedulerConfig::supplied())
        .observe_all(&journal.observer())
        .build()
        .unwrap();

    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    scheduler.start().unwrap();
    scheduler.stop().unwrap();
    assert_eq!(journal.count(EventKind::Started), 1);
    assert_eq!(journal.count(EventKind::Stopped), 1);
}

#[test]
fn test_builder_observe_single_kind() {
    let hits = Arc::new(AtomicU32::new(0));
    let observer: ObserverFn = {
        let hits = Arc::clone(&hits);
        Arc::new(move |_: &Event| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    };
    let scheduler = SchedulerBuilder::new(SchedulerConfig::supplied())
        .observe(EventKind::Stopped, observer)
        .build()
        .unwrap();
    scheduler.start().unwrap();
    scheduler.dispose().unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let result = SchedulerBuilder::new(SchedulerConfig::automated(0, 1)).build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_build_named_schedulers() {
    let mut configs = HashMap::new();
    configs.insert("timer".to_owned(), SchedulerConfig::automated(100, 2));
    configs.insert("batches".to_owned(), SchedulerConfig::supplied());

    let schedulers = build_schedulers(&configs).unwrap();
    assert_eq!(schedulers.len(), 2);
    assert_eq!(schedulers["timer"].source_kind(), RoundSourceKind::Automated);
    assert_eq!(schedulers["batches"].source_kind(), RoundSourceKind::Supplied);
}

#[test]
fn test_build_named_schedulers_names_bad_entry() {
    let mut configs = HashMap::new();
    configs.insert("broken".to_owned(), SchedulerConfig::automated(10, 0));
    match build_schedulers(&configs) {
        Err(SchedulerError::InvalidConfig(msg)) => assert!(msg.contains("broken")),
        other => panic!("unexpected result: {other:?}"),
    }
}

//! Tests for snapshot and health payloads

use std::time::{Duration, Instant};

use prometheus_slot_scheduler::core::{
    ItemOptions, ItemState, RoundSourceKind, Scheduler, SchedulerState,
};
use prometheus_slot_scheduler::runtime::{health, SchedulerSnapshot};

#[test]
fn test_snapshot_reflects_items() {
    let scheduler = Scheduler::new_supplied();
    let a = scheduler.add(1.0, |_| Ok(())).unwrap();
    let b = scheduler
        .add_with_options(2.0, ItemOptions::SEPARATE_THREAD, |_| Ok(()))
        .unwrap();
    b.stop().unwrap();

    scheduler.start().unwrap();
    scheduler.supply(2).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while scheduler.rounds_completed() < 1 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }

    let snapshot = scheduler.snapshot();
    assert_eq!(snapshot.state, SchedulerState::Running);
    assert_eq!(snapshot.source, RoundSourceKind::Supplied);
    assert_eq!(snapshot.rounds_completed, 1);
    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(snapshot.item(a.id()).map(|i| i.executions), Some(2));
    assert_eq!(snapshot.item(b.id()).map(|i| i.state), Some(ItemState::Stopped));
    assert_eq!(snapshot.total_executions(), 2);

    let json = serde_json::to_string(&snapshot).unwrap();
    let back: SchedulerSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back.items.len(), 2);
}

#[test]
fn test_health_tracks_lifecycle() {
    let scheduler = Scheduler::new_supplied();
    let _ = scheduler.add(1.0, |_| Ok(())).unwrap();
    let report = health(&scheduler);
    assert!(report.ok);
    assert_eq!(report.items, 1);
    assert_eq!(report.state, SchedulerState::Stopped);

    scheduler.dispose().unwrap();
    let report = health(&scheduler);
    assert!(!report.ok);
    assert_eq!(report.items, 0);
}

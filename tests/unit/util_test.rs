//! Tests for utility functions

use prometheus_slot_scheduler::core::Scheduler;
use prometheus_slot_scheduler::util::{now_ms, ItemId, SchedulerId};

fn issued_ids(count: usize) -> Vec<ItemId> {
    let scheduler = Scheduler::new_supplied();
    (0..count)
        .map(|_| scheduler.add(1.0, |_| Ok(())).unwrap().id())
        .collect()
}

#[test]
fn test_item_id_display_and_order() {
    let ids = issued_ids(2);
    assert_eq!(ids[0].to_string(), "item-1");
    assert_eq!(ids[1].get(), 2);
    assert!(ids[0] < ids[1]);
}

#[test]
fn test_scheduler_ids_are_unique() {
    let a = SchedulerId::new();
    let b = SchedulerId::new();
    assert_ne!(a, b);
    assert_eq!(a.to_string().len(), 36);
}

#[test]
fn test_ids_serialize_transparently() {
    let id = issued_ids(3)[2];
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "3");
    let back: ItemId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
    assert!(a > 1_600_000_000_000);
}

#[test]
fn test_tracing_init_is_idempotent() {
    prometheus_slot_scheduler::util::init_tracing_with("prometheus_slot_scheduler=debug");
    prometheus_slot_scheduler::util::init_tracing();
    tracing::info!("tracing installed");
}

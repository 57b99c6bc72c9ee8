//! Tests for the async event stream.

#![cfg(feature = "tokio-runtime")]

use std::time::Duration;

use prometheus_slot_scheduler::core::{EventKind, Scheduler};
use prometheus_slot_scheduler::runtime::event_stream;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stream_delivers_round_and_lifecycle_events() {
    let scheduler = Scheduler::new_supplied();
    let _item = scheduler.add(1.0, |_| Ok(())).unwrap();
    let mut stream = event_stream(&scheduler, &[EventKind::Started, EventKind::Executing]).unwrap();

    scheduler.start().unwrap();
    scheduler.supply(2).unwrap();

    let started = tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .expect("started event")
        .unwrap();
    assert_eq!(started.kind, EventKind::Started);

    let round = tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .expect("executing event")
        .unwrap();
    assert_eq!(round.kind, EventKind::Executing);
    assert_eq!(round.round, Some(1));
    assert_eq!(round.slots, Some(2));
}

#[tokio::test]
async fn test_stream_ends_after_dispose() {
    let scheduler = Scheduler::new_supplied();
    let mut stream = event_stream(&scheduler, &[EventKind::Stopped]).unwrap();

    scheduler.start().unwrap();
    scheduler.dispose().unwrap();

    let stopped = stream.recv().await.unwrap();
    assert_eq!(stopped.kind, EventKind::Stopped);
    assert!(stream.recv().await.is_none());
}

#[tokio::test]
async fn test_dropping_stream_unsubscribes() {
    let scheduler = Scheduler::new_supplied();
    let stream = event_stream(&scheduler, &[EventKind::Started, EventKind::Stopped]).unwrap();
    drop(stream);

    let mut other = event_stream(&scheduler, &[EventKind::Started]).unwrap();
    scheduler.start().unwrap();
    assert_eq!(other.try_recv().map(|e| e.kind), Some(EventKind::Started));
    assert!(other.try_recv().is_none());
}

#[tokio::test]
async fn test_stream_on_disposed_scheduler_fails() {
    let scheduler = Scheduler::new_supplied();
    scheduler.dispose().unwrap();
    assert!(event_stream(&scheduler, &[EventKind::Started]).is_err());
}

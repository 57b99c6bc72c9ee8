//! Tests for the event journal used as a scheduler observer

use std::time::{Duration, Instant};

use prometheus_slot_scheduler::core::{EventJournal, EventKind, Scheduler};

#[test]
fn test_journal_records_rounds_in_order() {
    let journal = EventJournal::new(100);
    let scheduler = Scheduler::new_supplied();
    scheduler.attach(EventKind::Executing, journal.observer()).unwrap();
    let _item = scheduler.add(1.0, |_| Ok(())).unwrap();

    scheduler.start().unwrap();
    for slots in [1, 2, 3] {
        scheduler.supply(slots).unwrap();
    }
    let deadline = Instant::now() + Duration::from_secs(5);
    while scheduler.rounds_completed() < 3 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }

    let rounds: Vec<Option<u64>> = journal.records().iter().map(|r| r.round).collect();
    assert_eq!(rounds, vec![Some(1), Some(2), Some(3)]);
    let seqs: Vec<u64> = journal.records().iter().map(|r| r.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_journal_records_serialize() {
    let journal = EventJournal::new(4);
    let scheduler = Scheduler::new_supplied();
    scheduler.attach(EventKind::Started, journal.observer()).unwrap();
    scheduler.start().unwrap();

    let json = serde_json::to_value(journal.records()).unwrap();
    assert_eq!(json[0]["kind"], "started");
    assert_eq!(json[0]["scheduler"], scheduler.id().to_string());
}

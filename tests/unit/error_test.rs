//! Tests for error types

use prometheus_slot_scheduler::core::{EventKind, Scheduler, SchedulerError};

#[test]
fn test_invalid_weight_error() {
    let err = SchedulerError::InvalidWeight { weight: -2.0 };
    assert_eq!(
        format!("{err}"),
        "invalid weight -2: weights must be finite and non-negative"
    );
    assert_eq!(err.as_label(), "invalid_weight");
}

#[test]
fn test_item_errors_name_the_item() {
    let scheduler = Scheduler::new_supplied();
    let item = scheduler.add(1.0, |_| Ok(())).unwrap();
    let id = item.id();

    assert_eq!(
        SchedulerError::ItemDisposed(id).to_string(),
        "item-1 has been disposed"
    );
    scheduler.remove(id).unwrap();
    let err = scheduler.remove(id).unwrap_err();
    assert_eq!(err.to_string(), "item-1 is not registered");
}

#[test]
fn test_unsupported_event_error() {
    let err = SchedulerError::UnsupportedEvent {
        kind: EventKind::Exception,
    };
    assert_eq!(err.to_string(), "Exception events are not emitted for items");
}

#[test]
fn test_disposed_classification() {
    assert!(SchedulerError::Disposed.is_disposed());
    let scheduler = Scheduler::new_supplied();
    let item = scheduler.add(1.0, |_| Ok(())).unwrap();
    assert!(SchedulerError::ItemDisposed(item.id()).is_disposed());
    assert!(!SchedulerError::SupplyUnsupported.is_disposed());
    assert!(!SchedulerError::InvalidSupply(0).is_disposed());
}

#[test]
fn test_errors_convert_into_callback_results() {
    fn callback() -> prometheus_slot_scheduler::AppResult<()> {
        let outcome: Result<(), SchedulerError> = Err(SchedulerError::Disposed);
        outcome?;
        Ok(())
    }
    let err = callback().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SchedulerError>(),
        Some(SchedulerError::Disposed)
    ));
}

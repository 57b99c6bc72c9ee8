//! Tests for configuration validation

use prometheus_slot_scheduler::config::{RoundSourceConfig, SchedulerConfig, WorkerConfig};

#[test]
fn test_automated_config_validation() {
    assert!(SchedulerConfig::automated(100, 4).validate().is_ok());
    assert!(SchedulerConfig::automated(0, 4).validate().is_err());
    assert!(SchedulerConfig::automated(100, 0).validate().is_err());
}

#[test]
fn test_worker_config_validation() {
    let cfg =
        SchedulerConfig::supplied().with_worker(WorkerConfig::new().with_thread_stack_size(1024));
    let err = cfg.validate().unwrap_err();
    assert!(err.starts_with("worker invalid"));

    let cfg =
        SchedulerConfig::supplied().with_worker(WorkerConfig::new().with_thread_name_prefix(""));
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_pass_limit_rejected() {
    let cfg = SchedulerConfig::supplied().with_max_passes_per_round(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_automated() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{ "rounds": { "mode": "automated", "period_ms": 50, "slots_per_period": 3 } }"#,
    )
    .unwrap();
    assert_eq!(
        cfg.rounds,
        RoundSourceConfig::Automated {
            period_ms: 50,
            slots_per_period: 3
        }
    );
    assert_eq!(cfg.worker, WorkerConfig::default());
    assert_eq!(cfg.max_passes_per_round, 65_536);
}

#[test]
fn test_from_json_supplied_with_worker() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{
            "rounds": { "mode": "supplied" },
            "worker": { "join_grace_ms": 250, "thread_name_prefix": "ingest" },
            "max_passes_per_round": 128
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.rounds, RoundSourceConfig::Supplied);
    assert_eq!(cfg.worker.join_grace_ms, 250);
    assert_eq!(cfg.worker.thread_name_prefix, "ingest");
    assert_eq!(cfg.worker.thread_stack_size, 2 * 1024 * 1024);
    assert_eq!(cfg.max_passes_per_round, 128);
}

#[test]
fn test_from_json_errors() {
    let err = SchedulerConfig::from_json_str("{").unwrap_err();
    assert!(err.starts_with("parse error"));

    let err = SchedulerConfig::from_json_str(
        r#"{ "rounds": { "mode": "automated", "period_ms": 0, "slots_per_period": 1 } }"#,
    )
    .unwrap_err();
    assert!(err.contains("period_ms"));
}

#[test]
fn test_config_json_roundtrip_shape() {
    let json = serde_json::to_value(SchedulerConfig::automated(10, 2)).unwrap();
    assert_eq!(json["rounds"]["mode"], "automated");
    assert_eq!(json["rounds"]["slots_per_period"], 2);
}

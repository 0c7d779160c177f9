//! Monitor scenarios backed by a JSONL telemetry file.

use std::sync::Arc;

use parking_lot::Mutex;
use scenario_sampler::core::config::MonitorConfig;
use scenario_sampler::monitor::event::{Overlay, TelemetryEvent};
use scenario_sampler::monitor::rare_event::TestKind;
use scenario_sampler::monitor::realtime::{
    AlertKind, AlertSeverity, MonitorNotification, RealTimeMonitor,
};
use scenario_sampler::monitor::store::{JsonlTelemetryStore, TelemetryStore};

fn config() -> MonitorConfig {
    MonitorConfig {
        max_events: 1_000,
        min_samples_for_test: 100,
        min_samples_for_alert: 200,
        alert_significance: 0.01,
        max_deviation_sigma: 5.0,
        max_alert_history: 10,
    }
}

fn open(path: &std::path::Path) -> RealTimeMonitor {
    let store = JsonlTelemetryStore::new(path, config().max_events);
    RealTimeMonitor::new(config(), Box::new(store))
}

#[test]
fn events_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry").join("events.jsonl");

    {
        let monitor = open(&path);
        monitor.record_and_analyze(TelemetryEvent::now(Some(Overlay::UseNine)));
        monitor.record_and_analyze(TelemetryEvent::now(Some(Overlay::UseSix)));
        monitor.record_and_analyze(TelemetryEvent::now(None).with_field("hexagram", 11));
    }

    let reopened = open(&path);
    assert_eq!(reopened.event_count(), 3);
    let analysis = reopened.analyze();
    assert_eq!(analysis.observed.use_nine, 1);
    assert_eq!(analysis.observed.use_six, 1);
    assert_eq!(analysis.observed.combined, 2);
    assert_eq!(analysis.test.test, TestKind::InsufficientData);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 3);
    assert!(raw.contains("\"hexagram\":11"));
}

#[test]
fn anomalous_stream_raises_high_alert() {
    let dir = tempfile::tempdir().unwrap();
    let monitor = open(&dir.path().join("events.jsonl"));
    let alerts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&alerts);
    monitor.subscribe(move |n| {
        if let MonitorNotification::Alert { alert, .. } = n {
            sink.lock().push(alert.clone());
        }
    });

    for i in 0..200 {
        let overlay = (i % 10 == 0).then_some(Overlay::UseNine);
        monitor.record_and_analyze(TelemetryEvent::now(overlay));
    }

    let seen = alerts.lock();
    assert_eq!(seen.len(), 1, "alerting starts at the 200th event");
    assert_eq!(seen[0].kind, AlertKind::StatisticalAnomaly);
    assert_eq!(seen[0].severity, AlertSeverity::High);
    assert_eq!(seen[0].sample_size, 200);

    let report = monitor.generate_report();
    assert_eq!(report.total_events, 200);
    assert_eq!(report.alerts.len(), 1);
    assert!(report.analysis.test.significant);
    assert!(
        report
            .recommendations
            .iter()
            .any(|r| r.starts_with("Investigate the randomness source"))
    );
}

#[test]
fn quiet_stream_below_alert_floor_asks_for_more_data() {
    let dir = tempfile::tempdir().unwrap();
    let monitor = open(&dir.path().join("events.jsonl"));
    for _ in 0..150 {
        monitor.record_and_analyze(TelemetryEvent::now(None));
    }
    let report = monitor.generate_report();
    assert!(report.alerts.is_empty());
    assert_eq!(report.analysis.test.test, TestKind::BinomialNormalApproximation);
    assert!(!report.analysis.test.significant);
    assert!(report.recommendations[0].starts_with("Collect more data"));
}

#[test]
fn clear_removes_persisted_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let monitor = open(&path);
    monitor.record_and_analyze(TelemetryEvent::now(Some(Overlay::UseSix)));
    monitor.clear();
    assert_eq!(monitor.event_count(), 0);
    assert!(!path.exists());
    drop(monitor);
    assert_eq!(open(&path).event_count(), 0);
}

#[test]
fn corrupt_lines_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    std::fs::write(
        &path,
        "{\"timestamp\":\"2025-01-01T00:00:00Z\",\"overlay\":\"用九\"}\nnot json\n\n{\"timestamp\":\"2025-01-02T00:00:00Z\"}\n",
    )
    .unwrap();

    let store = JsonlTelemetryStore::new(&path, 10);
    let events = store.load();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].overlay, Some(Overlay::UseNine));
    assert_eq!(open(&path).analyze().observed.use_nine, 1);
}

#[test]
fn store_compacts_to_newest_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let mut store = JsonlTelemetryStore::new(&path, 20);
    for i in 0..23 {
        store.append(&TelemetryEvent::now(None).with_field("seq", i));
    }
    let events = store.load();
    assert_eq!(events.len(), 20);
    assert_eq!(events[0].extra["seq"], 3);
    assert_eq!(events[19].extra["seq"], 22);
}

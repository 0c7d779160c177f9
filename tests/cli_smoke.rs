mod common;

use common::run_cli_case;

#[test]
fn version_json_reports_package() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case("version_json", home.path(), &["version", "--json"]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let json = result.json();
    assert_eq!(json["binary"], "scs");
    assert_eq!(json["package"], "scenario_sampler");
    assert!(json["build"]["target"].is_string());
}

#[test]
fn theory_json_reports_probability_and_interval() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case(
        "theory_json",
        home.path(),
        &["theory", "--json", "--count", "3", "--total", "100000"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let json = result.json();
    let p = json["theoretical"]["theoretical"].as_f64().unwrap();
    assert!((p - 7.629_394_531_25e-6).abs() < 1e-15);
    assert_eq!(json["theoretical"]["per_million"], 8);
    let lower = json["interval"]["lower"].as_f64().unwrap();
    let upper = json["interval"]["upper"].as_f64().unwrap();
    assert!(lower <= 3e-5 && 3e-5 <= upper);
}

#[test]
fn theory_rejects_unsupported_confidence() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case(
        "theory_bad_confidence",
        home.path(),
        &["theory", "--count", "1", "--total", "10", "--confidence", "0.9"],
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("confidence"));
}

#[test]
fn select_json_returns_target_count() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case(
        "select_json",
        home.path(),
        &["select", "--json", "--synthesize", "40", "--seed", "7"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let json = result.json();
    assert_eq!(json["command"], "select");
    assert_eq!(json["target_count"], 8);
    assert_eq!(json["result"]["selected"].as_array().unwrap().len(), 8);
    assert_eq!(json["result"]["metrics"]["candidate_count"], 40);
    assert_eq!(json["result"]["metrics"]["success"], true);

    let activity = home
        .path()
        .join(".local/share/scs/activity.jsonl");
    let log = std::fs::read_to_string(activity).unwrap();
    assert!(log.contains("\"selection_complete\""));
}

#[test]
fn select_from_file_honours_count() {
    let home = tempfile::tempdir().unwrap();
    let pool = home.path().join("pool.json");
    std::fs::write(
        &pool,
        r#"[
            {"id": "a", "totalScore": 9.0, "path": [{"hex": 1, "line": 1}]},
            {"id": "b", "totalScore": 8.0, "path": [{"hex": 2, "line": 2}]},
            {"id": "c", "totalScore": 7.0, "path": [{"hex": 3, "line": 3}]}
        ]"#,
    )
    .unwrap();
    let result = run_cli_case(
        "select_file",
        home.path(),
        &["select", "--json", "--input", pool.to_str().unwrap(), "--count", "2"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let json = result.json();
    let selected = json["result"]["selected"].as_array().unwrap();
    assert_eq!(selected.len(), 2);
    assert_eq!(selected[0]["id"], "a");
    assert_eq!(selected[1]["id"], "b");
}

#[test]
fn stress_json_with_small_pools() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case(
        "stress_json",
        home.path(),
        &[
            "stress",
            "--json",
            "--pool-sizes",
            "10,20,40",
            "--test-cases",
            "3",
            "--parallelism",
            "2",
        ],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let json = result.json();
    let report = &json["report"];
    assert_eq!(report["cases"].as_array().unwrap().len(), 3);
    assert_eq!(report["summary"]["total_selections"], 9);
    assert!(report["scalability"]["complexity"].is_string());
}

#[test]
fn stress_rejects_zero_pool_size() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case(
        "stress_zero_pool",
        home.path(),
        &["stress", "--pool-sizes", "0,10"],
    );
    assert_eq!(result.status.code(), Some(1));
}

#[test]
fn monitor_record_report_clear_cycle() {
    let home = tempfile::tempdir().unwrap();

    let recorded = run_cli_case(
        "monitor_record",
        home.path(),
        &["monitor", "record", "--json", "--overlay", "use-nine", "--repeat", "3"],
    );
    assert!(recorded.status.success(), "log: {}", recorded.log_path.display());
    let json = recorded.json();
    assert_eq!(json["recorded"], 3);
    assert_eq!(json["analysis"]["observed"]["use_nine"], 3);

    let plain = run_cli_case(
        "monitor_record_plain",
        home.path(),
        &["monitor", "record", "--json"],
    );
    assert!(plain.status.success());

    let report = run_cli_case("monitor_report", home.path(), &["monitor", "report", "--json"]);
    assert!(report.status.success());
    let json = report.json();
    assert_eq!(json["report"]["total_events"], 4);
    assert_eq!(json["report"]["analysis"]["observed"]["combined"], 3);
    assert!(json["report"]["recommendations"][0]
        .as_str()
        .unwrap()
        .starts_with("Collect more data"));

    let cleared = run_cli_case("monitor_clear", home.path(), &["monitor", "clear", "--json"]);
    assert!(cleared.status.success());
    assert_eq!(cleared.json()["cleared"], 4);

    let after = run_cli_case("monitor_report_empty", home.path(), &["monitor", "report", "--json"]);
    assert_eq!(after.json()["report"]["total_events"], 0);
}

#[test]
fn monitor_rejects_unknown_overlay() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case(
        "monitor_bad_overlay",
        home.path(),
        &["monitor", "record", "--overlay", "use-seven"],
    );
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("unknown overlay"));
}

#[test]
fn config_validate_defaults_and_rejects_bad_file() {
    let home = tempfile::tempdir().unwrap();
    let ok = run_cli_case("config_validate", home.path(), &["config", "validate", "--json"]);
    assert!(ok.status.success());
    assert_eq!(ok.json()["valid"], true);

    let bad = home.path().join("bad.toml");
    std::fs::write(&bad, "[selector]\ntarget_count = 0\n").unwrap();
    let result = run_cli_case(
        "config_validate_bad",
        home.path(),
        &["config", "validate", "--json", "--config", bad.to_str().unwrap()],
    );
    assert_eq!(result.status.code(), Some(1));
    assert_eq!(result.json()["valid"], false);

    let missing = run_cli_case(
        "config_missing",
        home.path(),
        &["config", "show", "--config", "/definitely/not/here.toml"],
    );
    assert_eq!(missing.status.code(), Some(1));
}

#[test]
fn bench_writes_csv() {
    let home = tempfile::tempdir().unwrap();
    let csv = home.path().join("bench.csv");
    let result = run_cli_case(
        "bench_csv",
        home.path(),
        &["bench", "--json", "--iterations", "20", "--csv", csv.to_str().unwrap()],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    assert_eq!(result.json()["measurements"].as_array().unwrap().len(), 6);
    let contents = std::fs::read_to_string(&csv).unwrap();
    assert!(contents.starts_with("name,iterations"));
    assert_eq!(contents.lines().count(), 7);
}

#[test]
fn no_log_skips_activity_file() {
    let home = tempfile::tempdir().unwrap();
    let result = run_cli_case(
        "select_no_log",
        home.path(),
        &["select", "--json", "--no-log", "--synthesize", "10"],
    );
    assert!(result.status.success());
    assert!(!home.path().join(".local/share/scs/activity.jsonl").exists());
}

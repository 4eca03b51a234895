//! CLI integration tests for the demo and bench modes.

use std::process::Command;

fn summary_value<'a>(stdout: &'a str, key: &str) -> &'a str {
    let prefix = format!("{key}=");
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .unwrap_or_else(|| panic!("{key} line missing"))
        .trim()
}

#[test]
fn demo_cli_reports_reference_scenario() {
    let bin = env!("CARGO_BIN_EXE_priority_scheduler");
    // Run the demo binary with default settings.
    let output = Command::new(bin)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run demo binary");

    // Demo should exit cleanly.
    assert!(
        output.status.success(),
        "demo exited with non-zero status: {:?}",
        output.status
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("DEMO SUMMARY"),
        "demo summary missing from output"
    );

    assert_eq!(summary_value(&stdout, "scenario_order"), "[5, 4, 1, 3]");
    assert_eq!(summary_value(&stdout, "scenario_ok"), "true");
    assert_eq!(summary_value(&stdout, "underflow_on_empty"), "true");
    assert_eq!(summary_value(&stdout, "not_found_on_absent"), "true");
    assert_eq!(summary_value(&stdout, "duplicate_tasks"), "false");
    assert_eq!(summary_value(&stdout, "leftover_tasks"), "0");
}

#[test]
fn bench_cli_prints_single_csv_row() {
    let bin = env!("CARGO_BIN_EXE_priority_scheduler");
    let output = Command::new(bin)
        .args(["bench", "2", "50", "40", "0", "validate"])
        .output()
        .expect("failed to run bench");
    assert!(output.status.success(), "bench failed: {:?}", output.status);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "expected header and one row: {stdout}");
    assert!(lines[0].starts_with("workers,tasks_per_worker,"));
    let row: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(&row[..4], &["2", "50", "40", "100"]);
    // duplicate_tasks and heap_violation close the row.
    assert_eq!(&row[row.len() - 2..], &["false", "false"]);
}

#[test]
fn unknown_command_exits_with_usage() {
    let bin = env!("CARGO_BIN_EXE_priority_scheduler");
    let output = Command::new(bin)
        .arg("frobnicate")
        .output()
        .expect("failed to run binary");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown command: frobnicate"));
}

#[test]
fn invalid_bench_arguments_exit_with_usage() {
    let bin = env!("CARGO_BIN_EXE_priority_scheduler");
    let cases = [
        (vec!["bench", "0"], "bench: workers must be > 0"),
        (vec!["bench", "2", "18446744073709551615"], "too large"),
        (vec!["stress", "1", "1", "200"], "stress: reprioritize_pct must be <= 100"),
    ];
    for (args, expected) in cases {
        let output = Command::new(bin)
            .args(&args)
            .output()
            .expect("failed to run binary");
        assert_eq!(output.status.code(), Some(2), "args {args:?}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains(expected), "args {args:?} stderr: {stderr}");
        // Usage goes to stdout; no CSV header should precede it.
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Usage:"), "usage missing for {args:?}");
        assert!(!stdout.contains("workers,tasks_per_worker"));
    }
}

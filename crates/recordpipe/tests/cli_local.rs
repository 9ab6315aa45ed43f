#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::Command;

fn unique_temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "rpcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

fn recordpipe() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_recordpipe"));
    cmd.env_remove("RECORDPIPE_COUNT")
        .env_remove("RECORDPIPE_CAPACITY")
        .env_remove("RECORDPIPE_STAGE_DIR")
        .arg("--log-level")
        .arg("error");
    cmd
}

#[test]
fn local_run_reports_every_record_as_json() {
    let dir = unique_temp_dir("local");

    let output = recordpipe()
        .args(["--format", "json", "local", "--count", "6", "--capacity", "2"])
        .args(["--seed", "11", "--stage-dir"])
        .arg(&dir)
        .output()
        .expect("local should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();

    let records: Vec<_> = events.iter().filter(|e| e["event"] == "record").collect();
    assert_eq!(records.len(), 6);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["identifier"], format!("student{}.xml", i + 1));
        assert_eq!(record["courses"].as_array().map(Vec::len), Some(4));
    }

    let summary = events.last().expect("summary line expected");
    assert_eq!(summary["event"], "local-complete");
    assert_eq!(summary["consumed"], 6);
    assert_eq!(summary["rejected"], 0);

    let leftover = std::fs::read_dir(&dir).expect("stage dir should exist").count();
    assert_eq!(leftover, 0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn local_pretty_output_has_report_blocks() {
    let dir = unique_temp_dir("pretty");

    let output = recordpipe()
        .args(["--format", "pretty", "local", "--count", "2", "--seed", "5"])
        .arg("--stage-dir")
        .arg(&dir)
        .output()
        .expect("local should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("===== STUDENT REPORT =====").count(), 2);
    assert!(stdout.contains("Average:"));
    assert!(stdout.contains("Producer-Consumer Simulation Completed."));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn seeded_runs_repeat() {
    let run = |tag: &str| {
        let dir = unique_temp_dir(tag);
        let output = recordpipe()
            .args(["--format", "json", "local", "--count", "3", "--seed", "99"])
            .arg("--stage-dir")
            .arg(&dir)
            .output()
            .expect("local should run");
        let _ = std::fs::remove_dir_all(&dir);
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| line.contains("\"event\":\"record\""))
            .map(str::to_owned)
            .collect::<Vec<_>>()
    };
    let first = run("seed-a");
    assert_eq!(first.len(), 3);
    assert_eq!(first, run("seed-b"));
}

#[test]
fn zero_capacity_is_usage_error() {
    let output = recordpipe()
        .args(["local", "--capacity", "0"])
        .output()
        .expect("local should run");
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--capacity"));
}

#[test]
fn bad_delay_is_usage_error() {
    let output = recordpipe()
        .args(["local", "--count", "1", "--max-delay", "soon"])
        .output()
        .expect("local should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_name() {
    let output = recordpipe()
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("recordpipe "));
}

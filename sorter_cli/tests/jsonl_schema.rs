use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[color]
window_ms = 1
settle_ms = 0

[weight]
sample_count = 1
sample_delay_ms = 0
init_timeout_ms = 200

[servo]
move_delay_ms = 0
hold_ms = 0

[runner]
mode = "auto"
auto_delay_s = 0.0
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON ({e}): {l}")))
        .collect()
}

/// Every stdout line is JSON; beans then one summary.
#[rstest]
fn jsonl_sort_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let summary_path = dir.path().join("out").join("summary.json");
    fs::create_dir_all(summary_path.parent().unwrap()).unwrap();

    let mut cmd = Command::cargo_bin("sorter_cli").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .args(["sort", "--max-beans", "4", "--summary"])
        .arg(&summary_path);

    let out = cmd.assert().success().get_output().stdout.clone();
    let lines = json_lines(&out);

    let beans: Vec<_> = lines.iter().filter(|v| v["event"] == "bean").collect();
    assert_eq!(beans.len(), 4, "stdout: {lines:?}");
    for (i, b) in beans.iter().enumerate() {
        assert_eq!(b["seq"].as_u64(), Some(i as u64 + 1));
        for key in [
            "timestamp",
            "trigger",
            "red",
            "green",
            "blue",
            "weight_g",
            "weight_source",
            "weight_ok",
            "anomalous",
            "verdict",
            "disposition",
            "angle_deg",
            "clamped",
        ] {
            assert!(b.get(key).is_some(), "bean line missing {key}: {b}");
        }
        assert_eq!(b["trigger"], "timer");
        assert_eq!(b["weight_source"], "measured");
    }
    // Simulated beans alternate good and bad references
    assert_eq!(beans[0]["verdict"], "GOOD");
    assert_eq!(beans[0]["disposition"], "ACCEPT");
    assert_eq!(beans[1]["verdict"], "BAD");
    assert_eq!(beans[1]["disposition"], "REJECT");

    let summary = lines.last().unwrap();
    assert_eq!(summary["event"], "summary");
    assert_eq!(summary["stop"], "bean_limit");
    assert_eq!(summary["total"], 4);
    assert_eq!(summary["good"], 2);
    assert_eq!(summary["bad"], 2);
    assert_eq!(summary["good_pct"], 50.0);
    assert!((summary["avg_weight_g"].as_f64().unwrap() - 0.3).abs() < 1e-9);
    assert!(summary["teardown_error"].is_null());

    // The summary file matches what was printed
    let file: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(file["total"], summary["total"]);
    assert_eq!(file["stop"], "bean_limit");
    // No staging files left behind
    let leftovers: Vec<_> = fs::read_dir(summary_path.parent().unwrap())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

/// Degraded weight is announced as a JSON event and every bean reports the default source.
#[rstest]
fn jsonl_degraded_weight() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("sorter_cli")
        .unwrap()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .args(["sort", "--max-beans", "2"])
        .env("SORTER_SIM_TARE", "fail")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let lines = json_lines(&out);

    assert_eq!(lines[0]["event"], "weight_degraded");
    let beans: Vec<_> = lines.iter().filter(|v| v["event"] == "bean").collect();
    assert_eq!(beans.len(), 2);
    assert!(beans.iter().all(|b| b["weight_source"] == "default"));
    assert_eq!(lines.last().unwrap()["degraded_weight"], 2);
}

/// Errors under --json are a single structured object on stderr.
#[rstest]
fn jsonl_error_object() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[classifier]\nacceptance_radius = -1.0\n").unwrap();

    let out = Command::cargo_bin("sorter_cli")
        .unwrap()
        .args(["--json", "--log-level", "off", "--config"])
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(3)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&out);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or_else(|| panic!("no JSON error line; stderr was: {stderr}"));
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Config");
    assert!(v["message"].as_str().unwrap().contains("acceptance_radius"));
}

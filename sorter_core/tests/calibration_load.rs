use std::fs;

use sorter_core::CalibrationProfile;
use sorter_core::calibration::{DEFAULT_BAD, DEFAULT_BLACK, DEFAULT_GOOD, DEFAULT_WHITE};
use sorter_core::Rgb;

fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let p = dir.path().join("calibration.json");
    fs::write(&p, body).unwrap();
    p
}

#[test]
fn absent_file_gives_default_profile() {
    let dir = tempfile::tempdir().unwrap();
    let p = CalibrationProfile::load(Some(&dir.path().join("missing.json")));
    assert!(p.is_default);
    assert_eq!(p.good, DEFAULT_GOOD);
}

#[test]
fn unparseable_file_gives_default_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "white = 12");
    let p = CalibrationProfile::load(Some(&path));
    assert!(p.is_default);
    assert_eq!(p.white, DEFAULT_WHITE);
}

#[test]
fn flat_document_is_used_as_is() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"{
            "timestamp": "2025-03-01T10:00:00",
            "white": {"r": 8000, "g": 110000, "b": 22000},
            "black": {"r": 4000, "g": 58000, "b": 11000},
            "good_reference": {"r": 5600, "g": 79000, "b": 15900},
            "bad_reference": {"r": 5400, "g": 77000, "b": 15400}
        }"#,
    );
    let p = CalibrationProfile::load(Some(&path));
    assert!(!p.is_default);
    assert!(p.fallbacks.is_empty());
    assert_eq!(p.white, Rgb::new(8000.0, 110_000.0, 22_000.0));
    assert_eq!(p.timestamp.as_deref(), Some("2025-03-01T10:00:00"));
    assert_eq!(p.sum_midpoint(), (100_500.0 + 97_800.0) / 2.0);
}

#[test]
fn missing_reference_falls_back_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"{
            "timestamp": "2025-03-01",
            "readings": {
                "white": {"red": 8000, "green": 110000, "blue": 22000},
                "black": {"red": 4000, "green": 58000, "blue": 11000},
                "good_bean": {"red": 5600, "green": 79000, "blue": 15900},
                "bad_bean": "not measured"
            }
        }"#,
    );
    let p = CalibrationProfile::load(Some(&path));
    assert!(!p.is_default);
    assert_eq!(p.fallbacks, vec!["bad_reference"]);
    assert_eq!(p.bad, DEFAULT_BAD);
    assert_eq!(p.good, Rgb::new(5600.0, 79_000.0, 15_900.0));
    assert_ne!(p.black, DEFAULT_BLACK);
}

#[test]
fn empty_object_falls_back_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "{}");
    let p = CalibrationProfile::load(Some(&path));
    assert!(p.is_default);
    assert_eq!(p.fallbacks.len(), 4);
}

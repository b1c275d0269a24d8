use std::io::Write;

use sorter_config::{RgbRecord, load_calibration_json, parse_calibration_json};

fn rgb(r: f64, g: f64, b: f64) -> Option<RgbRecord> {
    Some(RgbRecord { r, g, b })
}

#[test]
fn flat_layout_with_short_keys() {
    let doc = parse_calibration_json(
        r#"{
            "white": {"r": 7676, "g": 111882, "b": 22040},
            "black": {"r": 3863, "g": 57776, "b": 11557},
            "good_reference": {"r": 5616, "g": 78890, "b": 15887},
            "bad_reference": {"r": 5401, "g": 76952, "b": 15366},
            "timestamp": "2025-03-01T10:00:00"
        }"#,
    )
    .expect("parse");
    assert_eq!(doc.white, rgb(7676.0, 111882.0, 22040.0));
    assert_eq!(doc.bad_reference, rgb(5401.0, 76952.0, 15366.0));
    assert_eq!(doc.timestamp.as_deref(), Some("2025-03-01T10:00:00"));
    assert!(doc.problems.is_empty());
}

#[test]
fn wrapped_layout_from_calibration_procedure() {
    let doc = parse_calibration_json(
        r#"{
            "timestamp": 1717171717.5,
            "readings": {
                "white": {"red": 900, "green": 1000, "blue": 1100},
                "black": {"red": 100, "green": 110, "blue": 120},
                "good_bean": {"red": 500, "green": 520, "blue": 530},
                "bad_bean": {"red": 300, "green": 310, "blue": 320}
            }
        }"#,
    )
    .expect("parse");
    assert_eq!(doc.good_reference, rgb(500.0, 520.0, 530.0));
    assert_eq!(doc.bad_reference, rgb(300.0, 310.0, 320.0));
    assert_eq!(doc.timestamp.as_deref(), Some("1717171717.5"));
}

#[test]
fn partial_document_reports_each_gap() {
    let doc = parse_calibration_json(
        r#"{
            "white": {"r": 1, "g": 2, "b": 3},
            "black": {"r": 0, "g": 0},
            "good_reference": {"r": 1, "g": 1, "b": 1}
        }"#,
    )
    .expect("partial documents still parse");
    assert!(doc.white.is_some());
    assert!(doc.black.is_none());
    assert!(doc.bad_reference.is_none());
    assert_eq!(doc.problems.len(), 2);
    assert!(doc.problems.iter().any(|p| p.starts_with("black reference malformed")));
    assert!(doc.problems.iter().any(|p| p == "bad_reference reference missing"));
}

#[test]
fn non_object_root_is_an_error() {
    assert!(parse_calibration_json("[1, 2, 3]").is_err());
    assert!(parse_calibration_json("not json").is_err());
}

#[test]
fn loads_from_disk() {
    let mut f = tempfile::NamedTempFile::new().expect("tmp");
    write!(f, r#"{{"white":[3,3,3],"black":[1,1,1],"good":[2,2,2],"bad":[1.5,1.5,1.5]}}"#)
        .expect("write");
    let doc = load_calibration_json(f.path()).expect("load");
    assert_eq!(doc.black, rgb(1.0, 1.0, 1.0));
}

#[test]
fn missing_file_error_names_the_path() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let path = dir.path().join("absent.json");
    let err = load_calibration_json(&path).expect_err("absent");
    assert!(format!("{err}").contains("absent.json"));
}

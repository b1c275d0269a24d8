#![no_main]
use libfuzzer_sys::fuzz_target;
use sorter_core::{CalibrationProfile, FeatureVector};

fuzz_target!(|data: &str| {
    let Ok(doc) = sorter_config::parse_calibration_json(data) else {
        return;
    };
    // Whatever survives parsing must yield a usable profile
    let profile = CalibrationProfile::from_document(&doc);
    let n = profile.normalize_rgb(FeatureVector::new(5500.0, 78_000.0, 15_600.0, 0.2).rgb());
    assert!(n.is_finite());
    assert!((0.0..=100.0).contains(&n.r));
});

use rstest::rstest;
use sorter_config::{RunMode, Strategy, load_toml};

const FULL: &str = r#"
[pins]
color_s0 = 17
color_s1 = 18
color_s2 = 27
color_s3 = 22
color_out = 24
servo = 12
loadcell_dt = 5
loadcell_sck = 6
ir_sensor = 4
led_green = 23
led_red = 25

[color]
frequency_scaling = "20%"
window_ms = 100
settle_ms = 100
samples_per_channel = 2
intensity_scale = 0.1

[weight]
enabled = true
scale_divisor = -0.01
sample_count = 5
init_timeout_ms = 3000
default_weight_g = 0.25
min_g = 0.1
max_g = 0.5

[servo]
home_deg = 90
good_deg = 45
bad_deg = 135
move_delay_ms = 500
hold_ms = 1000

[classifier]
strategy = "threshold"
sum_threshold = 9910.0

[runner]
mode = "auto"
auto_delay_s = 1.5
"#;

#[test]
fn full_config_parses_and_validates() {
    let cfg = load_toml(FULL).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.classifier.strategy, Strategy::Threshold);
    assert_eq!(cfg.classifier.sum_threshold, Some(9910.0));
    assert_eq!(cfg.runner.mode, RunMode::Auto);
    assert_eq!(cfg.color.samples_per_channel, 2);
    assert!((cfg.servo.good_deg - 45.0).abs() < f32::EPSILON);
}

#[test]
fn omitted_sections_take_defaults() {
    let cfg = load_toml("[servo]\nhold_ms = 200\n").expect("parse");
    cfg.validate().expect("valid");
    assert_eq!(cfg.servo.hold_ms, 200);
    assert_eq!(cfg.servo.move_delay_ms, 500);
    assert_eq!(cfg.presence.debounce_ms, 500);
    assert!(cfg.presence.active_low);
    assert_eq!(cfg.weight.init_timeout_ms, 3000);
    assert_eq!(cfg.classifier.dark_defect_fraction, None);
}

#[rstest]
#[case("[weight]\nscale_divisor = 0.0", "weight.scale_divisor must be non-zero")]
#[case("[weight]\nsample_count = 0", "weight.sample_count must be >= 1")]
#[case("[weight]\nmin_g = 0.6\nmax_g = 0.5", "weight.min_g must be <= weight.max_g")]
#[case("[color]\nwindow_ms = 0", "color.window_ms must be in 1..=5000")]
#[case("[color]\nfrequency_scaling = \"50%\"", "color.frequency_scaling must be one of")]
#[case("[color]\nintensity_scale = 0.0", "color.intensity_scale must be > 0")]
#[case("[servo]\ngood_deg = 200", "servo.good_deg must be in [0, 180]")]
#[case("[presence]\npoll_ms = 0", "presence.poll_ms must be >= 1")]
#[case("[classifier]\nacceptance_radius = 0.0", "classifier.acceptance_radius must be > 0")]
#[case("[classifier]\ndark_defect_fraction = 1.5", "classifier.dark_defect_fraction must be in")]
#[case("[classifier]\nstrategy = \"model\"", "classifier.model_path is required")]
#[case("[telemetry]\nenabled = true", "telemetry.url is required")]
#[case("[telemetry]\nevery_n = 0", "telemetry.every_n must be >= 1")]
#[case("[runner]\nhistory_len = 0", "runner.history_len must be >= 1")]
#[case("[runner]\nauto_delay_s = -1.0", "runner.auto_delay_s must be between 0")]
#[case("[runner]\nauto_delay_s = 1e19", "runner.auto_delay_s must be between 0")]
#[case("[pins]\nservo = 17", "both use gpio 17")]
#[case("[pins]\nir_sensor = 40", "pins.ir_sensor must be a bcm gpio")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be")]
fn rejects_out_of_range(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    let msg = format!("{err}").to_lowercase();
    assert!(msg.contains(&needle.to_lowercase()), "got: {msg}");
}

#[test]
fn unknown_strategy_fails_to_parse() {
    assert!(load_toml("[classifier]\nstrategy = \"svm\"").is_err());
}

#[test]
fn model_strategy_with_path_is_valid() {
    let cfg = load_toml("[classifier]\nstrategy = \"model\"\nmodel_path = \"tree.json\"")
        .expect("parse");
    cfg.validate().expect("valid");
}

#[test]
fn shipped_sample_config_is_valid() {
    let cfg = load_toml(include_str!("../../etc/sorter_config.toml")).expect("sample parses");
    cfg.validate().expect("sample validates");
    assert_eq!(cfg.runner.mode, RunMode::Sensor);
    assert_eq!(cfg.classifier.strategy, Strategy::Distance);
    assert_eq!(cfg.calibration.path.as_deref(), Some("calibration_data.json"));
}

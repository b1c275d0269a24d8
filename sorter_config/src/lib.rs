#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration parsing for the bean sorter.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The calibration JSON loader accepts both the flat reference layout and the
//!   `readings` layout written by the calibration procedure, reporting each
//!   missing or malformed reference instead of failing the whole document.
use std::path::Path;

use eyre::WrapErr;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pins {
    pub color_s0: u8,
    pub color_s1: u8,
    pub color_s2: u8,
    pub color_s3: u8,
    pub color_out: u8,
    pub servo: u8,
    pub loadcell_dt: u8,
    pub loadcell_sck: u8,
    pub ir_sensor: u8,
    pub led_green: Option<u8>,
    pub led_red: Option<u8>,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            color_s0: 17,
            color_s1: 18,
            color_s2: 27,
            color_s3: 22,
            color_out: 24,
            servo: 12,
            loadcell_dt: 5,
            loadcell_sck: 6,
            ir_sensor: 4,
            led_green: Some(23),
            led_red: Some(25),
        }
    }
}

impl Pins {
    fn assignments(&self) -> Vec<(&'static str, u8)> {
        let mut v = vec![
            ("color_s0", self.color_s0),
            ("color_s1", self.color_s1),
            ("color_s2", self.color_s2),
            ("color_s3", self.color_s3),
            ("color_out", self.color_out),
            ("servo", self.servo),
            ("loadcell_dt", self.loadcell_dt),
            ("loadcell_sck", self.loadcell_sck),
            ("ir_sensor", self.ir_sensor),
        ];
        if let Some(p) = self.led_green {
            v.push(("led_green", p));
        }
        if let Some(p) = self.led_red {
            v.push(("led_red", p));
        }
        v
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ColorCfg {
    /// TCS3200 output scaling: "off" | "2%" | "20%" | "100%"
    pub frequency_scaling: String,
    /// Edge counting window per channel (ms)
    pub window_ms: u64,
    /// Filter settle delay after each channel switch (ms)
    pub settle_ms: u64,
    /// Windows averaged per channel after one settle
    pub samples_per_channel: u32,
    /// Multiplier applied to every measured rate
    pub intensity_scale: f64,
}

impl Default for ColorCfg {
    fn default() -> Self {
        Self {
            frequency_scaling: "100%".to_string(),
            window_ms: 50,
            settle_ms: 100,
            samples_per_channel: 1,
            intensity_scale: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WeightCfg {
    /// false starts in degraded mode without touching the load cell
    pub enabled: bool,
    /// grams = raw / scale_divisor
    pub scale_divisor: f64,
    pub sample_count: u32,
    pub sample_delay_ms: u64,
    /// Upper bound on load cell start-up (tare)
    pub init_timeout_ms: u64,
    /// Substituted for every bean while degraded
    pub default_weight_g: f64,
    pub min_g: f64,
    pub max_g: f64,
}

impl Default for WeightCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            scale_divisor: -0.01,
            sample_count: 5,
            sample_delay_ms: 100,
            init_timeout_ms: 3000,
            default_weight_g: 0.25,
            min_g: 0.1,
            max_g: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServoCfg {
    pub home_deg: f32,
    pub good_deg: f32,
    pub bad_deg: f32,
    /// Settle after every move before the signal is released (ms)
    pub move_delay_ms: u64,
    /// Dwell in the sort position before returning home (ms)
    pub hold_ms: u64,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            home_deg: 90.0,
            good_deg: 45.0,
            bad_deg: 135.0,
            move_delay_ms: 500,
            hold_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PresenceCfg {
    /// Active level must persist this long to count as a bean (ms)
    pub debounce_ms: u64,
    pub poll_ms: u64,
    /// Treat low level as "object present" when true
    pub active_low: bool,
}

impl Default for PresenceCfg {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            poll_ms: 10,
            active_low: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Distance,
    Threshold,
    Model,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierCfg {
    pub strategy: Strategy,
    /// Max normalized distance for a GOOD/BAD verdict
    pub acceptance_radius: f64,
    /// When set, green and blue above this fraction of the bad reference is BAD outright
    pub dark_defect_fraction: Option<f64>,
    /// Overrides the RGB-sum midpoint derived from calibration
    pub sum_threshold: Option<f64>,
    /// Decision tree JSON for the "model" strategy
    pub model_path: Option<String>,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self {
            strategy: Strategy::Distance,
            acceptance_radius: 30.0,
            dark_defect_fraction: None,
            sum_threshold: None,
            model_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryCfg {
    pub enabled: bool,
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Push a snapshot every N sorted beans
    pub every_n: u64,
    pub timeout_ms: u64,
    /// Pending snapshots before new ones are dropped
    pub queue: usize,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            api_key: None,
            every_n: 10,
            timeout_ms: 2000,
            queue: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Operator presses Enter for every bean
    Manual,
    /// Fixed delay between beans
    Auto,
    /// IR presence sensor, with Enter as a fallback trigger
    #[default]
    Sensor,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerCfg {
    pub mode: RunMode,
    /// Inter-bean delay in automatic mode (seconds)
    pub auto_delay_s: f64,
    /// Sort events kept in memory
    pub history_len: usize,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            mode: RunMode::Sensor,
            auto_delay_s: 2.0,
            history_len: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Calibration JSON; absent or unreadable falls back to built-in references
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for HX711 data-ready (DT low) before failing
    pub sensor_read_timeout_ms: u64,
    /// HX711 clock pulses per conversion (25 = channel A, gain 128)
    pub hx711_gain_pulses: u8,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 500,
            hx711_gain_pulses: 25,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub color: ColorCfg,
    pub weight: WeightCfg,
    pub servo: ServoCfg,
    pub presence: PresenceCfg,
    pub classifier: ClassifierCfg,
    pub telemetry: TelemetryCfg,
    pub runner: RunnerCfg,
    pub calibration: CalibrationCfg,
    pub logging: Logging,
    pub hardware: Hardware,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Upper bound on `runner.auto_delay_s` (one day).
pub const MAX_AUTO_DELAY_S: f64 = 86_400.0;

const FREQUENCY_SCALINGS: [&str; 4] = ["off", "2%", "20%", "100%"];

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let pins = self.pins.assignments();
        for (i, (name, pin)) in pins.iter().enumerate() {
            if *pin > 27 {
                eyre::bail!("pins.{name} must be a BCM GPIO in 0..=27, got {pin}");
            }
            if let Some((other, _)) = pins[i + 1..].iter().find(|(_, p)| p == pin) {
                eyre::bail!("pins.{name} and pins.{other} both use GPIO {pin}");
            }
        }

        // Color
        if !FREQUENCY_SCALINGS.contains(&self.color.frequency_scaling.as_str()) {
            eyre::bail!(
                "color.frequency_scaling must be one of off, 2%, 20%, 100% (got {:?})",
                self.color.frequency_scaling
            );
        }
        if self.color.window_ms == 0 || self.color.window_ms > 5000 {
            eyre::bail!("color.window_ms must be in 1..=5000");
        }
        if self.color.settle_ms > 5000 {
            eyre::bail!("color.settle_ms is unreasonably large (>5s)");
        }
        if self.color.samples_per_channel == 0 {
            eyre::bail!("color.samples_per_channel must be >= 1");
        }
        if !(self.color.intensity_scale.is_finite() && self.color.intensity_scale > 0.0) {
            eyre::bail!("color.intensity_scale must be > 0");
        }

        // Weight
        if !self.weight.scale_divisor.is_finite() || self.weight.scale_divisor == 0.0 {
            eyre::bail!("weight.scale_divisor must be non-zero");
        }
        if self.weight.sample_count == 0 {
            eyre::bail!("weight.sample_count must be >= 1");
        }
        if self.weight.init_timeout_ms == 0 {
            eyre::bail!("weight.init_timeout_ms must be >= 1");
        }
        if !self.weight.default_weight_g.is_finite() {
            eyre::bail!("weight.default_weight_g must be finite");
        }
        if !(self.weight.min_g.is_finite() && self.weight.max_g.is_finite())
            || self.weight.min_g > self.weight.max_g
        {
            eyre::bail!("weight.min_g must be <= weight.max_g");
        }

        // Servo
        for (name, deg) in [
            ("home_deg", self.servo.home_deg),
            ("good_deg", self.servo.good_deg),
            ("bad_deg", self.servo.bad_deg),
        ] {
            if !(0.0..=180.0).contains(&deg) {
                eyre::bail!("servo.{name} must be in [0, 180]");
            }
        }
        if self.servo.move_delay_ms > 10_000 || self.servo.hold_ms > 10_000 {
            eyre::bail!("servo delays are unreasonably large (>10s)");
        }

        // Presence
        if self.presence.poll_ms == 0 {
            eyre::bail!("presence.poll_ms must be >= 1");
        }
        if self.presence.debounce_ms > 60_000 {
            eyre::bail!("presence.debounce_ms is unreasonably large (>60s)");
        }

        // Classifier
        if !(self.classifier.acceptance_radius.is_finite()
            && self.classifier.acceptance_radius > 0.0)
        {
            eyre::bail!("classifier.acceptance_radius must be > 0");
        }
        if let Some(f) = self.classifier.dark_defect_fraction
            && !(f > 0.0 && f <= 1.0)
        {
            eyre::bail!("classifier.dark_defect_fraction must be in (0.0, 1.0]");
        }
        if let Some(t) = self.classifier.sum_threshold
            && !t.is_finite()
        {
            eyre::bail!("classifier.sum_threshold must be finite");
        }
        if self.classifier.strategy == Strategy::Model && self.classifier.model_path.is_none() {
            eyre::bail!("classifier.model_path is required when strategy = \"model\"");
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.url.as_deref().is_none_or(str::is_empty) {
            eyre::bail!("telemetry.url is required when telemetry is enabled");
        }
        if self.telemetry.every_n == 0 {
            eyre::bail!("telemetry.every_n must be >= 1");
        }
        if self.telemetry.queue == 0 {
            eyre::bail!("telemetry.queue must be >= 1");
        }

        // Runner
        if !(0.0..=MAX_AUTO_DELAY_S).contains(&self.runner.auto_delay_s) {
            eyre::bail!("runner.auto_delay_s must be between 0 and {MAX_AUTO_DELAY_S}");
        }
        if self.runner.history_len == 0 {
            eyre::bail!("runner.history_len must be >= 1");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }
        if !(25..=27).contains(&self.hardware.hx711_gain_pulses) {
            eyre::bail!("hardware.hx711_gain_pulses must be 25, 26 or 27");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be never, daily or hourly");
        }

        Ok(())
    }
}

// ── Calibration JSON ─────────────────────────────────────────────────────────

/// One reference colour as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbRecord {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Accepts `{"r":..,"g":..,"b":..}`, `{"red":..,"green":..,"blue":..}` or `[r, g, b]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RgbJson {
    Triple([f64; 3]),
    Table {
        #[serde(alias = "red")]
        r: f64,
        #[serde(alias = "green")]
        g: f64,
        #[serde(alias = "blue")]
        b: f64,
    },
}

impl From<RgbJson> for RgbRecord {
    fn from(v: RgbJson) -> Self {
        match v {
            RgbJson::Triple([r, g, b]) | RgbJson::Table { r, g, b } => Self { r, g, b },
        }
    }
}

/// Which stored reference a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    White,
    Black,
    Good,
    Bad,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::White,
        ReferenceKind::Black,
        ReferenceKind::Good,
        ReferenceKind::Bad,
    ];

    /// Accepted JSON keys, canonical first.
    fn keys(self) -> &'static [&'static str] {
        match self {
            ReferenceKind::White => &["white"],
            ReferenceKind::Black => &["black"],
            ReferenceKind::Good => &["good_reference", "good_bean", "good"],
            ReferenceKind::Bad => &["bad_reference", "bad_bean", "bad"],
        }
    }

    pub fn name(self) -> &'static str {
        self.keys()[0]
    }
}

/// A parsed calibration file. Each reference is `None` when missing or malformed;
/// `problems` explains why.
#[derive(Debug, Clone, Default)]
pub struct CalibrationDocument {
    pub timestamp: Option<String>,
    pub white: Option<RgbRecord>,
    pub black: Option<RgbRecord>,
    pub good_reference: Option<RgbRecord>,
    pub bad_reference: Option<RgbRecord>,
    pub problems: Vec<String>,
}

impl CalibrationDocument {
    pub fn get(&self, kind: ReferenceKind) -> Option<RgbRecord> {
        match kind {
            ReferenceKind::White => self.white,
            ReferenceKind::Black => self.black,
            ReferenceKind::Good => self.good_reference,
            ReferenceKind::Bad => self.bad_reference,
        }
    }

    fn set(&mut self, kind: ReferenceKind, v: Option<RgbRecord>) {
        match kind {
            ReferenceKind::White => self.white = v,
            ReferenceKind::Black => self.black = v,
            ReferenceKind::Good => self.good_reference = v,
            ReferenceKind::Bad => self.bad_reference = v,
        }
    }
}

/// Parse calibration JSON text.
///
/// Only a document that is not JSON, or whose root is not an object, is an error.
pub fn parse_calibration_json(s: &str) -> eyre::Result<CalibrationDocument> {
    let root: serde_json::Value =
        serde_json::from_str(s).wrap_err("calibration is not valid JSON")?;
    let Some(obj) = root.as_object() else {
        eyre::bail!("calibration root must be a JSON object");
    };

    let mut doc = CalibrationDocument {
        timestamp: obj.get("timestamp").and_then(|t| match t {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }),
        ..CalibrationDocument::default()
    };

    let readings = obj
        .get("readings")
        .and_then(serde_json::Value::as_object)
        .unwrap_or(obj);

    for kind in ReferenceKind::ALL {
        let Some(raw) = kind.keys().iter().find_map(|k| readings.get(*k)) else {
            doc.problems.push(format!("{} reference missing", kind.name()));
            continue;
        };
        match serde_json::from_value::<RgbJson>(raw.clone()) {
            Ok(v) => doc.set(kind, Some(v.into())),
            Err(e) => doc
                .problems
                .push(format!("{} reference malformed: {e}", kind.name())),
        }
    }

    Ok(doc)
}

pub fn load_calibration_json(path: &Path) -> eyre::Result<CalibrationDocument> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read calibration {}", path.display()))?;
    parse_calibration_json(&text).wrap_err_with(|| format!("parse calibration {}", path.display()))
}

// ── Decision tree JSON ───────────────────────────────────────────────────────

/// One node of an exported decision tree. Features are ordered r, g, b, weight;
/// `x[feature] <= threshold` follows `left`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: u8,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct TreeDocument {
    pub nodes: Vec<TreeNode>,
}

pub fn parse_tree_json(s: &str) -> eyre::Result<TreeDocument> {
    serde_json::from_str(s).wrap_err("decision tree is not a valid {\"nodes\": [...]} document")
}

pub fn load_tree_json(path: &Path) -> eyre::Result<TreeDocument> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read decision tree {}", path.display()))?;
    parse_tree_json(&text).wrap_err_with(|| format!("parse decision tree {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_nodes_parse_both_shapes() {
        let doc = parse_tree_json(
            r#"{"nodes":[{"feature":3,"threshold":0.2,"left":1,"right":2},{"class":0},{"class":1}]}"#,
        )
        .expect("parse");
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.nodes[2], TreeNode::Leaf { class: 1 });
        assert!(matches!(doc.nodes[0], TreeNode::Split { feature: 3, .. }));
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg = load_toml("").expect("parse");
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.classifier.strategy, Strategy::Distance);
        assert_eq!(cfg.runner.mode, RunMode::Sensor);
        assert_eq!(cfg.telemetry.every_n, 10);
    }

    #[test]
    fn rgb_accepts_array_form() {
        let doc = parse_calibration_json(
            r#"{"white":[1,2,3],"black":[0,0,0],"good":[1,1,1],"bad":[2,2,2]}"#,
        )
        .expect("parse");
        assert_eq!(
            doc.white,
            Some(RgbRecord {
                r: 1.0,
                g: 2.0,
                b: 3.0
            })
        );
        assert!(doc.problems.is_empty());
    }
}

//! Value types shared across the sort pipeline.

use chrono::{DateTime, Utc};
use sorter_traits::Channel;

/// Per-channel intensities in the sensor's rate units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
            Channel::Clear => self.sum() / 3.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.r + self.g + self.b
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    pub fn distance(&self, other: &Rgb) -> f64 {
        let dr = self.r - other.r;
        let dg = self.g - other.g;
        let db = self.b - other.b;
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

impl From<[f64; 3]> for Rgb {
    fn from([r, g, b]: [f64; 3]) -> Self {
        Self { r, g, b }
    }
}

/// The (R, G, B, weight) measurement of one bean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    /// Grams; signed to allow tare drift.
    pub weight: f64,
}

impl FeatureVector {
    pub const fn new(red: f64, green: f64, blue: f64, weight: f64) -> Self {
        Self {
            red,
            green,
            blue,
            weight,
        }
    }

    pub fn rgb(&self) -> Rgb {
        Rgb::new(self.red, self.green, self.blue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Good,
    Bad,
    Unknown,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Good => "GOOD",
            Verdict::Bad => "BAD",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bean is routed. Only a GOOD colour verdict with an in-range weight is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accept,
    Reject,
}

impl Disposition {
    pub fn decide(verdict: Verdict, weight_ok: bool) -> Self {
        if verdict == Verdict::Good && weight_ok {
            Disposition::Accept
        } else {
            Disposition::Reject
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Accept => "ACCEPT",
            Disposition::Reject => "REJECT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSource {
    /// Read from the load cell.
    Measured,
    /// Load cell unavailable since start-up; configured default substituted.
    Default,
    /// Load cell read failed for this bean.
    Failed,
}

impl WeightSource {
    pub fn as_str(self) -> &'static str {
        match self {
            WeightSource::Measured => "measured",
            WeightSource::Default => "default",
            WeightSource::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Presence,
    Manual,
    Timer,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Presence => "presence",
            TriggerKind::Manual => "manual",
            TriggerKind::Timer => "timer",
        }
    }
}

/// A "bean arrived" event, whichever source produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub source: TriggerKind,
    /// Milliseconds since the sorter was built.
    pub at_ms: u64,
}

/// Result of measuring and classifying one bean, before actuation.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub features: FeatureVector,
    pub verdict: Verdict,
    pub weight_ok: bool,
    pub weight_source: WeightSource,
    /// A channel read was implausible and clamped.
    pub anomalous: bool,
    pub disposition: Disposition,
}

/// Immutable record of one sorted bean.
#[derive(Debug, Clone, PartialEq)]
pub struct SortEvent {
    pub seq: u64,
    pub features: FeatureVector,
    pub verdict: Verdict,
    pub weight_ok: bool,
    pub weight_source: WeightSource,
    pub anomalous: bool,
    pub disposition: Disposition,
    pub trigger: TriggerKind,
    /// Commanded sort angle after clamping.
    pub angle_deg: f32,
    pub clamped: bool,
    pub at_ms: u64,
    pub timestamp: DateTime<Utc>,
}

//! Calibration profile: white/black brackets and good/bad references.
//!
//! Loaded once at start-up and read-only afterwards. Loading never fails: an
//! absent or unreadable file yields the built-in profile, and a partial file
//! falls back per reference.

use std::path::Path;

use sorter_config::{CalibrationDocument, ReferenceKind, RgbRecord};
use sorter_traits::Channel;

use crate::types::Rgb;

pub const DEFAULT_WHITE: Rgb = Rgb::new(7676.0, 111_882.0, 22040.0);
pub const DEFAULT_BLACK: Rgb = Rgb::new(3863.0, 57776.0, 11557.0);
pub const DEFAULT_GOOD: Rgb = Rgb::new(5616.0, 78890.0, 15887.0);
pub const DEFAULT_BAD: Rgb = Rgb::new(5401.0, 76952.0, 15366.0);

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationProfile {
    pub white: Rgb,
    pub black: Rgb,
    pub good: Rgb,
    pub bad: Rgb,
    pub timestamp: Option<String>,
    /// No calibration data was used at all.
    pub is_default: bool,
    /// References that fell back to the built-in value.
    pub fallbacks: Vec<&'static str>,
    good_sum: f64,
    bad_sum: f64,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        let mut p = Self::new(DEFAULT_WHITE, DEFAULT_BLACK, DEFAULT_GOOD, DEFAULT_BAD);
        p.is_default = true;
        p
    }
}

impl CalibrationProfile {
    pub fn new(white: Rgb, black: Rgb, good: Rgb, bad: Rgb) -> Self {
        Self {
            white,
            black,
            good,
            bad,
            timestamp: None,
            is_default: false,
            fallbacks: Vec::new(),
            good_sum: good.sum(),
            bad_sum: bad.sum(),
        }
    }

    /// Build from a parsed document, substituting the built-in value for every
    /// missing or non-finite reference.
    pub fn from_document(doc: &CalibrationDocument) -> Self {
        let mut fallbacks = Vec::new();
        let mut pick = |kind: ReferenceKind, default: Rgb| match doc.get(kind).map(rgb_from) {
            Some(v) if v.is_finite() => v,
            _ => {
                tracing::warn!(reference = kind.name(), "calibration reference unavailable; using default");
                fallbacks.push(kind.name());
                default
            }
        };
        let white = pick(ReferenceKind::White, DEFAULT_WHITE);
        let black = pick(ReferenceKind::Black, DEFAULT_BLACK);
        let good = pick(ReferenceKind::Good, DEFAULT_GOOD);
        let bad = pick(ReferenceKind::Bad, DEFAULT_BAD);

        let mut p = Self::new(white, black, good, bad);
        p.is_default = fallbacks.len() == ReferenceKind::ALL.len();
        p.fallbacks = fallbacks;
        p.timestamp = doc.timestamp.clone();
        p.warn_inverted();
        p
    }

    /// Load from disk. `None`, an absent file and an unparseable file all give the default profile.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::warn!("no calibration file configured; using default calibration");
            return Self::default();
        };
        if !path.exists() {
            tracing::warn!(path = %path.display(), "calibration file not found; using default calibration");
            return Self::default();
        }
        match sorter_config::load_calibration_json(path) {
            Ok(doc) => {
                for p in &doc.problems {
                    tracing::warn!(path = %path.display(), problem = %p, "calibration incomplete");
                }
                let profile = Self::from_document(&doc);
                tracing::info!(
                    path = %path.display(),
                    timestamp = profile.timestamp.as_deref().unwrap_or("-"),
                    fallbacks = profile.fallbacks.len(),
                    "calibration loaded"
                );
                profile
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "calibration unreadable; using default calibration");
                Self::default()
            }
        }
    }

    fn warn_inverted(&self) {
        for ch in Channel::RGB {
            if self.white.get(ch) <= self.black.get(ch) {
                tracing::warn!(
                    channel = ch.name(),
                    white = self.white.get(ch),
                    black = self.black.get(ch),
                    "white does not exceed black; normalization for this channel is degenerate"
                );
            }
        }
    }

    /// Rescale a raw reading to [0, 100] between black (0) and white (100).
    ///
    /// Readings outside the bracket saturate. A zero or non-finite range gives 0.
    pub fn normalize(&self, value: f64, channel: Channel) -> f64 {
        let black = self.black.get(channel);
        let range = self.white.get(channel) - black;
        if range == 0.0 || !range.is_finite() {
            return 0.0;
        }
        let n = (value - black) / range * 100.0;
        if n.is_nan() {
            return 0.0;
        }
        n.clamp(0.0, 100.0)
    }

    pub fn normalize_rgb(&self, rgb: Rgb) -> Rgb {
        Rgb::new(
            self.normalize(rgb.r, Channel::Red),
            self.normalize(rgb.g, Channel::Green),
            self.normalize(rgb.b, Channel::Blue),
        )
    }

    pub fn good_sum(&self) -> f64 {
        self.good_sum
    }

    pub fn bad_sum(&self) -> f64 {
        self.bad_sum
    }

    /// Midpoint between the good and bad RGB sums.
    pub fn sum_midpoint(&self) -> f64 {
        (self.good_sum + self.bad_sum) / 2.0
    }

    /// How far apart the good and bad references sit, as a percentage of the
    /// mean white-black span. Higher is easier to sort.
    pub fn separability(&self) -> f64 {
        let diff: f64 = Channel::RGB
            .iter()
            .map(|&c| (self.good.get(c) - self.bad.get(c)).abs())
            .sum();
        let span: f64 = Channel::RGB
            .iter()
            .map(|&c| self.white.get(c) - self.black.get(c))
            .sum::<f64>()
            / 3.0;
        if span <= 0.0 || !span.is_finite() {
            return 0.0;
        }
        diff / span * 100.0
    }
}

fn rgb_from(r: RgbRecord) -> Rgb {
    Rgb::new(r.r, r.g, r.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(3863.0, 0.0)]
    #[case(7676.0, 100.0)]
    #[case(10_000.0, 100.0)]
    #[case(0.0, 0.0)]
    #[case(f64::NAN, 0.0)]
    #[case(f64::INFINITY, 100.0)]
    fn normalize_saturates(#[case] raw: f64, #[case] expected: f64) {
        let p = CalibrationProfile::default();
        assert!((p.normalize(raw, Channel::Red) - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_range_normalizes_to_zero() {
        let flat = Rgb::new(10.0, 10.0, 10.0);
        let p = CalibrationProfile::new(flat, flat, flat, flat);
        assert_eq!(p.normalize(25.0, Channel::Green), 0.0);
    }

    #[test]
    fn midpoint_uses_reference_sums() {
        let p = CalibrationProfile::new(
            Rgb::new(3.0, 3.0, 3.0),
            Rgb::new(0.0, 0.0, 0.0),
            Rgb::new(2.0, 2.0, 2.0),
            Rgb::new(1.0, 1.0, 1.0),
        );
        assert_eq!(p.sum_midpoint(), 4.5);
        // |2-1|*3 / 3 * 100
        assert!((p.separability() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn missing_path_is_default() {
        let p = CalibrationProfile::load(None);
        assert!(p.is_default);
        assert_eq!(p.white, DEFAULT_WHITE);
    }
}

//! Colour classification strategies.
//!
//! Every strategy is a pure function of the feature vector: no state is kept
//! between beans. The weight gate is not applied here; see `Disposition::decide`.

use std::sync::Arc;

use sorter_traits::BeanModel;

use crate::calibration::CalibrationProfile;
use crate::types::{FeatureVector, Verdict};

/// Nearest-reference classification in normalized [0, 100] space.
#[derive(Debug, Clone)]
pub struct DistanceClassifier {
    profile: Arc<CalibrationProfile>,
    acceptance_radius: f64,
    dark_defect_fraction: Option<f64>,
}

/// Full outcome of a distance evaluation, for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceReport {
    pub verdict: Verdict,
    pub dist_good: f64,
    pub dist_bad: f64,
    /// The dark-defect rule decided the verdict.
    pub short_circuit: bool,
}

impl DistanceClassifier {
    pub fn new(
        profile: Arc<CalibrationProfile>,
        acceptance_radius: f64,
        dark_defect_fraction: Option<f64>,
    ) -> Self {
        Self {
            profile,
            acceptance_radius,
            dark_defect_fraction,
        }
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Green and blue both above the configured fraction of the bad reference.
    fn dark_defect(&self, f: &FeatureVector) -> bool {
        self.dark_defect_fraction.is_some_and(|k| {
            f.green > k * self.profile.bad.g && f.blue > k * self.profile.bad.b
        })
    }

    pub fn evaluate(&self, f: &FeatureVector) -> DistanceReport {
        let live = self.profile.normalize_rgb(f.rgb());
        let good = self.profile.normalize_rgb(self.profile.good);
        let bad = self.profile.normalize_rgb(self.profile.bad);
        let dist_good = live.distance(&good);
        let dist_bad = live.distance(&bad);

        if self.dark_defect(f) {
            return DistanceReport {
                verdict: Verdict::Bad,
                dist_good,
                dist_bad,
                short_circuit: true,
            };
        }

        let r = self.acceptance_radius;
        let verdict = if dist_good < dist_bad && dist_good < r {
            Verdict::Good
        } else if dist_bad < dist_good && dist_bad < r {
            Verdict::Bad
        } else {
            Verdict::Unknown
        };
        DistanceReport {
            verdict,
            dist_good,
            dist_bad,
            short_circuit: false,
        }
    }
}

/// GOOD iff the raw RGB sum exceeds a single threshold. Binary: never UNKNOWN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSum {
    pub threshold: f64,
}

impl ThresholdSum {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Midpoint between the mean RGB sums of good and bad samples.
    pub fn from_averages(good_avg: f64, bad_avg: f64) -> Self {
        Self::new((good_avg + bad_avg) / 2.0)
    }

    pub fn from_profile(profile: &CalibrationProfile) -> Self {
        Self::new(profile.sum_midpoint())
    }

    pub fn classify(&self, f: &FeatureVector) -> Verdict {
        if f.rgb().sum() > self.threshold {
            Verdict::Good
        } else {
            Verdict::Bad
        }
    }
}

/// Strategy selected by configuration.
pub enum Classifier {
    Distance(DistanceClassifier),
    ThresholdSum(ThresholdSum),
    Learned(Box<dyn BeanModel + Send + Sync>),
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classifier::Distance(d) => f.debug_tuple("Distance").field(d).finish(),
            Classifier::ThresholdSum(t) => f.debug_tuple("ThresholdSum").field(t).finish(),
            Classifier::Learned(_) => f.write_str("Learned(..)"),
        }
    }
}

impl Classifier {
    pub fn name(&self) -> &'static str {
        match self {
            Classifier::Distance(_) => "distance",
            Classifier::ThresholdSum(_) => "threshold",
            Classifier::Learned(_) => "model",
        }
    }

    pub fn classify(&self, f: &FeatureVector) -> Verdict {
        match self {
            Classifier::Distance(d) => {
                let rep = d.evaluate(f);
                tracing::debug!(
                    dist_good = rep.dist_good,
                    dist_bad = rep.dist_bad,
                    short_circuit = rep.short_circuit,
                    verdict = %rep.verdict,
                    "distance classification"
                );
                rep.verdict
            }
            Classifier::ThresholdSum(t) => t.classify(f),
            Classifier::Learned(m) => match m.predict(f.red, f.green, f.blue, f.weight) {
                Ok(1) => Verdict::Good,
                Ok(0) => Verdict::Bad,
                Ok(other) => {
                    tracing::warn!(class = other, "model returned a class outside {{0, 1}}");
                    Verdict::Unknown
                }
                Err(e) => {
                    tracing::warn!(error = %e, "model prediction failed");
                    Verdict::Unknown
                }
            },
        }
    }
}

//! `From` implementations bridging `sorter_config` types to `sorter_core` types,
//! plus classifier selection from the `[classifier]` table.

use std::path::Path;
use std::sync::Arc;

use eyre::WrapErr;
use sorter_config::Strategy;

use crate::calibration::CalibrationProfile;
use crate::classifier::{Classifier, DistanceClassifier, ThresholdSum};
use crate::config::{ActuatorCfg, PresenceCfg, ReaderCfg, RunnerCfg, WeightCfg};
use crate::error::Result;
use crate::model::DecisionTreeModel;

// ── ReaderCfg ────────────────────────────────────────────────────────────────

impl From<&sorter_config::ColorCfg> for ReaderCfg {
    fn from(c: &sorter_config::ColorCfg) -> Self {
        Self {
            window_ms: c.window_ms,
            settle_ms: c.settle_ms,
            samples_per_channel: c.samples_per_channel,
            intensity_scale: c.intensity_scale,
        }
    }
}

// ── WeightCfg ────────────────────────────────────────────────────────────────

impl From<&sorter_config::WeightCfg> for WeightCfg {
    fn from(c: &sorter_config::WeightCfg) -> Self {
        Self {
            enabled: c.enabled,
            scale_divisor: c.scale_divisor,
            sample_count: c.sample_count,
            init_timeout_ms: c.init_timeout_ms,
            default_weight_g: c.default_weight_g,
            min_g: c.min_g,
            max_g: c.max_g,
        }
    }
}

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

impl From<&sorter_config::ServoCfg> for ActuatorCfg {
    fn from(c: &sorter_config::ServoCfg) -> Self {
        Self {
            home_deg: c.home_deg,
            good_deg: c.good_deg,
            bad_deg: c.bad_deg,
            move_delay_ms: c.move_delay_ms,
            hold_ms: c.hold_ms,
        }
    }
}

// ── PresenceCfg ──────────────────────────────────────────────────────────────

impl From<&sorter_config::PresenceCfg> for PresenceCfg {
    fn from(c: &sorter_config::PresenceCfg) -> Self {
        Self {
            debounce_ms: c.debounce_ms,
            poll_ms: c.poll_ms,
        }
    }
}

// ── RunnerCfg ────────────────────────────────────────────────────────────────

// Spans two tables: history lives under [runner], cadence under [telemetry].
impl From<&sorter_config::Config> for RunnerCfg {
    fn from(c: &sorter_config::Config) -> Self {
        Self {
            history_len: c.runner.history_len,
            telemetry_every_n: c.telemetry.every_n,
        }
    }
}

// ── CalibrationProfile ───────────────────────────────────────────────────────

impl From<&sorter_config::CalibrationDocument> for CalibrationProfile {
    fn from(doc: &sorter_config::CalibrationDocument) -> Self {
        Self::from_document(doc)
    }
}

// ── Classifier ───────────────────────────────────────────────────────────────

/// Build the configured classification strategy.
///
/// The model strategy fails when its tree cannot be loaded; the other two
/// cannot fail once the profile exists.
pub fn build_classifier(
    cfg: &sorter_config::ClassifierCfg,
    profile: Arc<CalibrationProfile>,
) -> Result<Classifier> {
    let classifier = match cfg.strategy {
        Strategy::Distance => Classifier::Distance(DistanceClassifier::new(
            profile,
            cfg.acceptance_radius,
            cfg.dark_defect_fraction,
        )),
        Strategy::Threshold => {
            let t = cfg
                .sum_threshold
                .map_or_else(|| ThresholdSum::from_profile(&profile), ThresholdSum::new);
            Classifier::ThresholdSum(t)
        }
        Strategy::Model => {
            let path = cfg
                .model_path
                .as_deref()
                .ok_or_else(|| eyre::eyre!("classifier.model_path is required for the model strategy"))?;
            let model = DecisionTreeModel::load(Path::new(path))
                .wrap_err_with(|| format!("loading decision tree {path}"))?;
            tracing::info!(path, nodes = model.len(), "decision tree loaded");
            Classifier::Learned(Box::new(model))
        }
    };
    tracing::info!(strategy = classifier.name(), "classifier ready");
    Ok(classifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureVector, Verdict};

    #[test]
    fn runner_cfg_takes_cadence_from_telemetry_table() {
        let mut c = sorter_config::Config::default();
        c.runner.history_len = 7;
        c.telemetry.every_n = 3;
        let r = RunnerCfg::from(&c);
        assert_eq!(r.history_len, 7);
        assert_eq!(r.telemetry_every_n, 3);
    }

    #[test]
    fn threshold_override_wins_over_profile_midpoint() {
        let cfg = sorter_config::ClassifierCfg {
            strategy: Strategy::Threshold,
            sum_threshold: Some(99_100.0),
            ..Default::default()
        };
        let c = build_classifier(&cfg, Arc::new(CalibrationProfile::default())).unwrap();
        assert_eq!(c.name(), "threshold");
        assert_eq!(
            c.classify(&FeatureVector::new(5600.0, 79_000.0, 15_900.0, 0.3)),
            Verdict::Good
        );
        assert_eq!(
            c.classify(&FeatureVector::new(5000.0, 75_000.0, 15_000.0, 0.3)),
            Verdict::Bad
        );
    }

    #[test]
    fn model_strategy_without_path_is_an_error() {
        let cfg = sorter_config::ClassifierCfg {
            strategy: Strategy::Model,
            ..Default::default()
        };
        let err = build_classifier(&cfg, Arc::new(CalibrationProfile::default())).unwrap_err();
        assert!(format!("{err}").contains("model_path"));
    }
}

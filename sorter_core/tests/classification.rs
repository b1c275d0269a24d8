use std::sync::Arc;

use rstest::rstest;
use sorter_core::{
    CalibrationProfile, Classifier, DistanceClassifier, Disposition, FeatureVector, Rgb,
    ThresholdSum, Verdict,
};

fn reference_profile() -> Arc<CalibrationProfile> {
    Arc::new(CalibrationProfile::new(
        Rgb::new(7676.0, 111_882.0, 22_040.0),
        Rgb::new(3863.0, 57_776.0, 11_557.0),
        Rgb::new(5616.0, 78_890.0, 15_887.0),
        Rgb::new(5401.0, 76_952.0, 15_366.0),
    ))
}

#[test]
fn reading_near_good_reference_is_good() {
    let c = DistanceClassifier::new(reference_profile(), 15.0, None);
    let rep = c.evaluate(&FeatureVector::new(5600.0, 79_000.0, 15_900.0, 0.3));
    assert_eq!(rep.verdict, Verdict::Good);
    assert!(rep.dist_good < 1.0, "dist_good = {}", rep.dist_good);
    assert!(rep.dist_good < rep.dist_bad);
    assert!(!rep.short_circuit);
}

#[test]
fn reading_far_from_both_references_is_unknown() {
    let c = DistanceClassifier::new(reference_profile(), 15.0, None);
    // Saturates at white on every channel.
    let rep = c.evaluate(&FeatureVector::new(9000.0, 120_000.0, 30_000.0, 0.3));
    assert_eq!(rep.verdict, Verdict::Unknown);
}

#[test]
fn reading_at_bad_reference_is_bad() {
    let c = DistanceClassifier::new(reference_profile(), 15.0, None);
    let rep = c.evaluate(&FeatureVector::new(5401.0, 76_952.0, 15_366.0, 0.3));
    assert_eq!(rep.verdict, Verdict::Bad);
    assert_eq!(rep.dist_bad, 0.0);
}

#[test]
fn dark_defect_rule_overrides_distance() {
    let c = DistanceClassifier::new(reference_profile(), 15.0, Some(0.8));
    // Green and blue above 0.8 x bad reference: BAD even though it sits on the good reference.
    let rep = c.evaluate(&FeatureVector::new(5616.0, 78_890.0, 15_887.0, 0.3));
    assert!(rep.short_circuit);
    assert_eq!(rep.verdict, Verdict::Bad);
}

#[rstest]
#[case(99_500.0, Verdict::Good)]
#[case(98_000.0, Verdict::Bad)]
#[case(99_100.0, Verdict::Bad)]
fn threshold_sum_from_sample_averages(#[case] sum: f64, #[case] expected: Verdict) {
    let c = Classifier::ThresholdSum(ThresholdSum::from_averages(100_500.0, 97_700.0));
    let f = FeatureVector::new(sum - 66_000.0, 33_000.0, 33_000.0, 0.3);
    assert_eq!(c.classify(&f), expected);
}

#[rstest]
#[case(Verdict::Good, true, Disposition::Accept)]
#[case(Verdict::Good, false, Disposition::Reject)]
#[case(Verdict::Bad, true, Disposition::Reject)]
#[case(Verdict::Unknown, true, Disposition::Reject)]
fn weight_gate_is_anded_with_colour(
    #[case] verdict: Verdict,
    #[case] weight_ok: bool,
    #[case] expected: Disposition,
) {
    assert_eq!(Disposition::decide(verdict, weight_ok), expected);
}

use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use sorter_core::{
    CalibrationProfile, Classifier, DecisionTreeModel, DistanceClassifier, FeatureVector,
    ThresholdSum,
};

// Readings scattered around the default good/bad references
fn synth_beans(n: usize, seed: u32) -> Vec<FeatureVector> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f64 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };
    (0..n)
        .map(|_| {
            let jitter = next_f64() * 2.0 - 1.0;
            FeatureVector::new(
                5500.0 + 300.0 * jitter,
                78_000.0 + 4000.0 * next_f64(),
                15_600.0 + 800.0 * jitter,
                0.1 + 0.4 * next_f64(),
            )
        })
        .collect()
}

const TREE: &str = r#"{"nodes":[
    {"feature":1,"threshold":77900.0,"left":1,"right":2},
    {"class":0},
    {"feature":3,"threshold":0.5,"left":3,"right":4},
    {"class":1},
    {"class":0}
]}"#;

pub fn bench_classifiers(c: &mut Criterion) {
    let mut g = c.benchmark_group("classify");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p sorter_core --bench classifier
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let beans = synth_beans(10_000, 0xBEA7);
    let profile = Arc::new(CalibrationProfile::default());
    let tree = sorter_config::parse_tree_json(TREE).expect("bench tree parses");
    let strategies = [
        (
            "distance",
            Classifier::Distance(DistanceClassifier::new(profile.clone(), 30.0, None)),
        ),
        (
            "distance_dark_defect",
            Classifier::Distance(DistanceClassifier::new(profile.clone(), 30.0, Some(0.8))),
        ),
        (
            "threshold",
            Classifier::ThresholdSum(ThresholdSum::from_profile(&profile)),
        ),
        (
            "tree",
            Classifier::Learned(Box::new(
                DecisionTreeModel::from_document(&tree).expect("bench tree is valid"),
            )),
        ),
    ];

    for (name, classifier) in &strategies {
        g.bench_function(*name, |b| {
            b.iter_batched(
                || beans.clone(),
                |batch| {
                    let good = batch
                        .iter()
                        .filter(|f| classifier.classify(black_box(f)) == sorter_core::Verdict::Good)
                        .count();
                    black_box(good);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(classifier, bench_classifiers);
criterion_main!(classifier);

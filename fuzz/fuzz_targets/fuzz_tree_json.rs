#![no_main]
use libfuzzer_sys::fuzz_target;
use sorter_core::DecisionTreeModel;

fuzz_target!(|data: &str| {
    let Ok(doc) = sorter_config::parse_tree_json(data) else {
        return;
    };
    // Accepted trees must evaluate without panicking or looping
    if let Ok(model) = DecisionTreeModel::from_document(&doc) {
        let _ = model.evaluate([5500.0, 78_000.0, 15_600.0, 0.2]);
        let _ = model.evaluate([f64::NAN, 0.0, -1.0, f64::INFINITY]);
    }
});

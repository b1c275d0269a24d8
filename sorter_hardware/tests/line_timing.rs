use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use sorter_hardware::error::HwError;
use sorter_hardware::util::{count_rising_edges, wait_until_low_with_timeout};

#[test]
fn data_ready_is_observed_when_line_drops() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let res = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(200),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected data ready, got {res:?}");
}

#[test]
fn missing_load_cell_times_out() {
    let err = wait_until_low_with_timeout(|| true, Duration::from_millis(5), Duration::from_micros(200))
        .expect_err("expected timeout error");
    assert!(matches!(err, HwError::DataReadyTimeout), "unexpected error: {err:?}");
}

#[test]
fn edge_counting_is_bounded_by_window() {
    let polls = AtomicU32::new(0);
    let started = Instant::now();
    let rate = count_rising_edges(
        || polls.fetch_add(1, Ordering::Relaxed) % 2 == 1,
        Duration::from_millis(20),
    );
    let elapsed = started.elapsed();
    assert!(rate > 0.0);
    assert!(elapsed >= Duration::from_millis(20));
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[test]
fn zero_window_reads_zero() {
    assert_eq!(count_rising_edges(|| true, Duration::ZERO), 0.0);
}

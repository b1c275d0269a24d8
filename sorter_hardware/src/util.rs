use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Poll a digital line for `window` and return rising edges per second.
///
/// The first sample only seeds the previous level, so a line that is already
/// high when counting starts does not contribute a spurious edge. A line that
/// never moves yields 0.0.
pub fn count_rising_edges(mut is_high: impl FnMut() -> bool, window: Duration) -> f64 {
    if window.is_zero() {
        return 0.0;
    }
    let start = Instant::now();
    let mut prev = is_high();
    let mut edges: u64 = 0;
    while start.elapsed() < window {
        let now = is_high();
        if now && !prev {
            edges += 1;
        }
        prev = now;
        std::hint::spin_loop();
    }
    edges as f64 / window.as_secs_f64()
}

/// Hobby servo duty cycle in percent for a 50 Hz signal.
///
/// 0° maps to 2 % (0.4 ms) and 180° to 12 % (2.4 ms).
#[inline]
pub fn servo_duty_percent(angle_deg: f32) -> f64 {
    2.0 + f64::from(angle_deg.clamp(0.0, 180.0)) / 18.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 2.0)]
    #[case(90.0, 7.0)]
    #[case(180.0, 12.0)]
    #[case(270.0, 12.0)]
    #[case(-10.0, 2.0)]
    fn duty_cycle_maps_angle(#[case] angle: f32, #[case] expected: f64) {
        assert!((servo_duty_percent(angle) - expected).abs() < 1e-9);
    }

    #[test]
    fn stuck_line_counts_zero_edges() {
        let rate = count_rising_edges(|| true, Duration::from_millis(5));
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn toggling_line_counts_edges() {
        let mut level = false;
        let rate = count_rising_edges(
            || {
                level = !level;
                level
            },
            Duration::from_millis(5),
        );
        assert!(rate > 0.0);
    }
}

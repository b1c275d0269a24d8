//! Session drivers built on `Sorter`: the sort loop itself and the two
//! diagnostic modes (actuator sweep and sensor read-out).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::actuator::{MoveOutcome, Position};
use crate::error::Result;
use crate::sorter::Sorter;
use crate::stats::SessionStats;
use crate::status::{SortStatus, StopReason};
use crate::types::Inspection;

/// Positions visited by the actuator test, in order.
pub const ACTUATOR_TEST_SEQUENCE: [Position; 6] = [
    Position::Home,
    Position::Good,
    Position::Bad,
    Position::Degrees(0.0),
    Position::Degrees(180.0),
    Position::Home,
];

/// How a sort session ended.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub stats: SessionStats,
    pub stop: StopReason,
    /// Teardown failed to park the diverter; carries the error text.
    pub teardown_error: Option<String>,
}

fn teardown_logged(sorter: &mut Sorter) -> Option<String> {
    match sorter.teardown() {
        Ok(()) => None,
        Err(e) => {
            let msg = format!("{e:#}");
            tracing::error!(error = %msg, "teardown failed; diverter may not be parked");
            Some(msg)
        }
    }
}

/// Sort beans until shutdown, source exhaustion or `max_beans` handled cycles
/// (sorted plus failed). Teardown runs on every exit path.
pub fn run_session(
    sorter: &mut Sorter,
    shutdown: &AtomicBool,
    max_beans: Option<u64>,
    mut on_status: impl FnMut(&SortStatus),
) -> SessionReport {
    tracing::info!(
        classifier = sorter.classifier().name(),
        degraded_weight = sorter.weight_channel().is_degraded(),
        max_beans,
        "sort session started"
    );
    let stop = loop {
        if let Some(n) = max_beans {
            let handled = sorter.stats().total + sorter.stats().failed_cycles;
            if handled >= n {
                break StopReason::BeanLimit;
            }
        }
        let status = sorter.step(shutdown);
        on_status(&status);
        if let SortStatus::Stopped(reason) = status {
            break reason;
        }
    };
    tracing::info!(reason = stop.as_str(), "sort session ending");
    let teardown_error = teardown_logged(sorter);
    SessionReport {
        stats: sorter.stats().clone(),
        stop,
        teardown_error,
    }
}

/// Sweep the diverter through `ACTUATOR_TEST_SEQUENCE`, dwelling `hold_ms`
/// at each stop, and finish parked at HOME.
pub fn run_actuator_test(
    sorter: &mut Sorter,
    shutdown: &AtomicBool,
    mut on_move: impl FnMut(Position, &MoveOutcome),
) -> Result<Vec<MoveOutcome>> {
    let clock = sorter.clock.clone();
    let hold = sorter.actuator.cfg().hold_ms;
    let mut moves = Vec::with_capacity(ACTUATOR_TEST_SEQUENCE.len());
    for pos in ACTUATOR_TEST_SEQUENCE {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("actuator test interrupted");
            break;
        }
        let out = sorter.actuator.move_to(pos, &*clock)?;
        tracing::info!(?pos, angle = out.angle, clamped = out.clamped, "actuator test step");
        on_move(pos, &out);
        moves.push(out);
        clock.sleep_ms(hold);
    }
    sorter.teardown()?;
    Ok(moves)
}

/// Measure and classify `reads` samples, `interval` apart, without moving
/// the diverter. A read failure ends the test with that error.
pub fn run_sensor_test(
    sorter: &mut Sorter,
    reads: u32,
    interval: Duration,
    shutdown: &AtomicBool,
    mut on_read: impl FnMut(u32, &Inspection),
) -> Result<Vec<Inspection>> {
    let clock = sorter.clock.clone();
    let mut out = Vec::with_capacity(reads as usize);
    for i in 1..=reads {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(completed = i - 1, "sensor test interrupted");
            break;
        }
        let insp = match sorter.inspect() {
            Ok(insp) => insp,
            Err(e) => {
                teardown_logged(sorter);
                return Err(e.wrap_err(format!("sensor read {i} of {reads}")));
            }
        };
        tracing::info!(
            read = i,
            r = insp.features.red,
            g = insp.features.green,
            b = insp.features.blue,
            weight_g = insp.features.weight,
            verdict = %insp.verdict,
            "sensor test read"
        );
        on_read(i, &insp);
        out.push(insp);
        if i < reads {
            clock.sleep(interval);
        }
    }
    teardown_logged(sorter);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::TimedSource;
    use crate::types::TriggerKind;
    use sorter_hardware::{SimulatedColorSensor, SimulatedServo};
    use sorter_traits::TestClock;

    fn sorter(servo: SimulatedServo, beans: Vec<[f64; 3]>) -> Sorter {
        Sorter::builder()
            .with_color_sensor(SimulatedColorSensor::new(beans))
            .with_servo(servo)
            .with_source(TimedSource::new(Duration::ZERO))
            .with_clock(Box::new(TestClock::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn bean_limit_counts_failed_cycles() {
        let servo = SimulatedServo::new().failing_at(45.0);
        let mut s = sorter(servo, vec![[5616.0, 78_890.0, 15_887.0]]);
        let stop = AtomicBool::new(false);
        let mut seen = Vec::new();
        let report = run_session(&mut s, &stop, Some(3), |st| {
            seen.push(matches!(st, SortStatus::Failed(_)));
        });
        assert_eq!(report.stop, StopReason::BeanLimit);
        assert_eq!(seen, vec![true, true, true]);
        assert_eq!(report.stats.failed_cycles, 3);
        assert_eq!(report.stats.total, 0);
    }

    #[test]
    fn session_history_is_tagged_with_timer() {
        let mut s = sorter(SimulatedServo::new(), vec![[5616.0, 78_890.0, 15_887.0]]);
        let stop = AtomicBool::new(false);
        let report = run_session(&mut s, &stop, Some(2), |_| {});
        assert_eq!(report.stats.total, 2);
        assert!(s.history().iter().all(|e| e.trigger == TriggerKind::Timer));
        assert!(report.teardown_error.is_none());
    }

    #[test]
    fn actuator_sweep_visits_every_stop_and_ends_home() {
        let servo = SimulatedServo::new();
        let log = servo.log();
        let mut s = sorter(servo, vec![[0.0, 0.0, 0.0]]);
        let stop = AtomicBool::new(false);
        let moves = run_actuator_test(&mut s, &stop, |_, _| {}).unwrap();
        let angles: Vec<f32> = moves.iter().map(|m| m.angle).collect();
        assert_eq!(angles, vec![90.0, 45.0, 135.0, 0.0, 180.0, 90.0]);
        assert_eq!(log.last_angle(), Some(90.0));
    }

    #[test]
    fn sensor_test_never_sorts() {
        let servo = SimulatedServo::new();
        let log = servo.log();
        let mut s = sorter(servo, vec![[5616.0, 78_890.0, 15_887.0]]);
        let parked = log.angles().len();
        let stop = AtomicBool::new(false);
        let reads = run_sensor_test(&mut s, 3, Duration::from_millis(10), &stop, |_, _| {}).unwrap();
        assert_eq!(reads.len(), 3);
        assert_eq!(s.stats().total, 0);
        // only the teardown park after the build-time park
        assert_eq!(log.angles().len(), parked + 1);
        assert!(log.angles().iter().all(|a| (*a - 90.0).abs() < f32::EPSILON));
    }
}

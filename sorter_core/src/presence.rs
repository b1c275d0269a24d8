//! Bean arrival: the presence debouncer and the event sources feeding the sorter.
//!
//! All sources are polled without blocking so the orchestrator can watch several
//! of them and the shutdown flag in one loop.

use std::io::BufRead;
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use sorter_traits::PresenceSensor;

use crate::config::PresenceCfg;
use crate::error::Result;
use crate::hw_error::hw_report;
use crate::types::TriggerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Idle,
    Present,
}

/// IDLE/PRESENT state machine with a persistence-based debounce.
///
/// The active level must hold for `debounce` before a detection is accepted.
/// A bean left under the sensor does not re-trigger until IDLE is seen again.
#[derive(Debug, Clone)]
pub struct PresenceDetector {
    debounce: Duration,
    state: PresenceState,
    active_since: Option<Instant>,
}

impl PresenceDetector {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: PresenceState::Idle,
            active_since: None,
        }
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    /// Feed one sample. Returns true exactly once per accepted presence.
    pub fn update(&mut self, active: bool, now: Instant) -> bool {
        match (self.state, active) {
            (PresenceState::Idle, true) => {
                let since = *self.active_since.get_or_insert(now);
                if now.saturating_duration_since(since) >= self.debounce {
                    self.state = PresenceState::Present;
                    self.active_since = None;
                    return true;
                }
                false
            }
            (PresenceState::Idle, false) => {
                self.active_since = None;
                false
            }
            (PresenceState::Present, false) => {
                self.state = PresenceState::Idle;
                false
            }
            (PresenceState::Present, true) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Ready,
    Pending,
    /// The source will never fire again.
    Exhausted,
}

/// Something that announces "a bean is ready to inspect".
pub trait BeanSource: Send {
    fn kind(&self) -> TriggerKind;

    /// Non-blocking check.
    fn poll(&mut self, now: Instant) -> Result<Poll>;

    /// Called after a bean has been fully processed.
    fn cycle_complete(&mut self, _now: Instant) {}
}

/// Presence sensor behind the debouncer.
pub struct PresenceSource {
    sensor: Box<dyn PresenceSensor + Send>,
    detector: PresenceDetector,
}

impl PresenceSource {
    pub fn new(sensor: Box<dyn PresenceSensor + Send>, debounce: Duration) -> Self {
        Self {
            sensor,
            detector: PresenceDetector::new(debounce),
        }
    }

    pub fn from_cfg(sensor: Box<dyn PresenceSensor + Send>, cfg: &PresenceCfg) -> Self {
        Self::new(sensor, Duration::from_millis(cfg.debounce_ms))
    }
}

impl BeanSource for PresenceSource {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Presence
    }

    fn poll(&mut self, now: Instant) -> Result<Poll> {
        let active = self
            .sensor
            .read_digital()
            .map_err(|e| hw_report(&e, "read presence sensor"))?;
        Ok(if self.detector.update(active, now) {
            Poll::Ready
        } else {
            Poll::Pending
        })
    }
}

/// Operator trigger: every message on the channel is one bean.
pub struct ManualSource {
    rx: xch::Receiver<()>,
}

impl ManualSource {
    pub fn new(rx: xch::Receiver<()>) -> Self {
        Self { rx }
    }

    /// Each line on stdin (the operator pressing Enter) is a trigger.
    /// The source is exhausted when stdin closes.
    pub fn from_stdin() -> std::io::Result<Self> {
        let (tx, rx) = xch::unbounded();
        std::thread::Builder::new()
            .name("manual-trigger".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    if line.is_err() || tx.send(()).is_err() {
                        break;
                    }
                }
                tracing::debug!("manual trigger input closed");
            })?;
        Ok(Self { rx })
    }
}

impl BeanSource for ManualSource {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Manual
    }

    fn poll(&mut self, _now: Instant) -> Result<Poll> {
        Ok(match self.rx.try_recv() {
            Ok(()) => Poll::Ready,
            Err(xch::TryRecvError::Empty) => Poll::Pending,
            Err(xch::TryRecvError::Disconnected) => Poll::Exhausted,
        })
    }
}

/// Fires immediately, then again `interval` after each processed bean.
#[derive(Debug, Clone)]
pub struct TimedSource {
    interval: Duration,
    due: Option<Instant>,
    armed: bool,
}

impl TimedSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            due: None,
            armed: true,
        }
    }
}

impl BeanSource for TimedSource {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Timer
    }

    fn poll(&mut self, now: Instant) -> Result<Poll> {
        if !self.armed {
            return Ok(Poll::Pending);
        }
        if self.due.is_none_or(|d| now >= d) {
            self.armed = false;
            return Ok(Poll::Ready);
        }
        Ok(Poll::Pending)
    }

    fn cycle_complete(&mut self, now: Instant) {
        // An interval past the end of Instant's range is never due
        self.due = now.checked_add(self.interval);
        self.armed = self.due.is_some();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn glitch_shorter_than_debounce_is_ignored() {
        let t0 = Instant::now();
        let mut d = PresenceDetector::new(500 * MS);
        assert!(!d.update(true, t0));
        assert!(!d.update(true, t0 + 499 * MS));
        assert!(!d.update(false, t0 + 500 * MS));
        assert!(!d.update(true, t0 + 600 * MS));
        assert!(!d.update(true, t0 + 1000 * MS));
        assert_eq!(d.state(), PresenceState::Idle);
    }

    #[test]
    fn long_presence_fires_once() {
        let t0 = Instant::now();
        let mut d = PresenceDetector::new(500 * MS);
        let fired: usize = (0..200)
            .map(|i| d.update(true, t0 + i * 10 * MS))
            .filter(|f| *f)
            .count();
        assert_eq!(fired, 1);
        assert_eq!(d.state(), PresenceState::Present);
        assert!(!d.update(false, t0 + 3000 * MS));
        assert_eq!(d.state(), PresenceState::Idle);
    }

    #[test]
    fn zero_debounce_fires_on_first_active_sample() {
        let mut d = PresenceDetector::new(Duration::ZERO);
        assert!(d.update(true, Instant::now()));
    }

    #[test]
    fn manual_source_exhausts_when_sender_drops() {
        let (tx, rx) = xch::unbounded();
        let mut s = ManualSource::new(rx);
        let now = Instant::now();
        assert_eq!(s.poll(now).unwrap(), Poll::Pending);
        tx.send(()).unwrap();
        assert_eq!(s.poll(now).unwrap(), Poll::Ready);
        drop(tx);
        assert_eq!(s.poll(now).unwrap(), Poll::Exhausted);
    }

    #[test]
    fn timer_waits_for_completion_plus_interval() {
        let t0 = Instant::now();
        let mut s = TimedSource::new(2000 * MS);
        assert_eq!(s.poll(t0).unwrap(), Poll::Ready);
        assert_eq!(s.poll(t0 + 5000 * MS).unwrap(), Poll::Pending);
        s.cycle_complete(t0 + 1000 * MS);
        assert_eq!(s.poll(t0 + 2999 * MS).unwrap(), Poll::Pending);
        assert_eq!(s.poll(t0 + 3000 * MS).unwrap(), Poll::Ready);
    }

    #[test]
    fn huge_interval_never_fires_again() {
        let t0 = Instant::now();
        let mut s = TimedSource::new(Duration::from_secs(u64::MAX));
        assert_eq!(s.poll(t0).unwrap(), Poll::Ready);
        s.cycle_complete(t0);
        assert_eq!(s.poll(t0 + 5000 * MS).unwrap(), Poll::Pending);
    }

    struct AlwaysPresent;
    impl PresenceSensor for AlwaysPresent {
        fn read_digital(&mut self) -> std::result::Result<bool, sorter_traits::BoxError> {
            Ok(true)
        }
    }

    #[test]
    fn presence_source_takes_debounce_from_cfg() {
        let cfg = PresenceCfg {
            debounce_ms: 200,
            ..PresenceCfg::default()
        };
        let mut s = PresenceSource::from_cfg(Box::new(AlwaysPresent), &cfg);
        let t0 = Instant::now();
        assert_eq!(s.poll(t0).unwrap(), Poll::Pending);
        assert_eq!(s.poll(t0 + 199 * MS).unwrap(), Poll::Pending);
        assert_eq!(s.poll(t0 + 200 * MS).unwrap(), Poll::Ready);
    }
}

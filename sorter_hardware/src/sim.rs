//! Simulated devices for development machines, tests and CI.
//!
//! Every simulated device answers instantly; timing is owned by the caller's clock.
//! Devices that tests need to observe after handing them to the sorter expose a
//! cloneable log handle.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sorter_traits::{
    BoxError, Channel, ColorSensor, Indicator, MassSensor, PresenceSensor, Servo,
};

use crate::error::HwError;

/// Colour sensor replaying a list of (r, g, b) rates, one entry per bean.
///
/// The cursor advances after the blue channel is counted, so the reader's
/// R, G, B sequence sees one consistent bean.
#[derive(Debug, Clone)]
pub struct SimulatedColorSensor {
    beans: Vec<[f64; 3]>,
    index: usize,
    channel: Channel,
}

impl SimulatedColorSensor {
    pub fn new(beans: Vec<[f64; 3]>) -> Self {
        let beans = if beans.is_empty() {
            vec![[0.0; 3]]
        } else {
            beans
        };
        Self {
            beans,
            index: 0,
            channel: Channel::Clear,
        }
    }

    /// A single reading repeated forever.
    pub fn constant(rgb: [f64; 3]) -> Self {
        Self::new(vec![rgb])
    }

    pub fn current(&self) -> [f64; 3] {
        self.beans[self.index % self.beans.len()]
    }
}

impl ColorSensor for SimulatedColorSensor {
    fn select_channel(&mut self, channel: Channel) -> Result<(), BoxError> {
        self.channel = channel;
        Ok(())
    }

    fn count_edges(&mut self, _window: Duration) -> Result<f64, BoxError> {
        let [r, g, b] = self.current();
        let rate = match self.channel {
            Channel::Red => r,
            Channel::Green => g,
            Channel::Blue => {
                self.index = (self.index + 1) % self.beans.len();
                b
            }
            Channel::Clear => (r + g + b) / 3.0,
        };
        Ok(rate)
    }
}

/// How the simulated load cell behaves during `tare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TareBehavior {
    #[default]
    Ok,
    /// Block for the given time before succeeding (models a missing HX711).
    Hang(Duration),
    Fail,
}

/// Load cell replaying bean masses in grams, reported as raw counts.
#[derive(Debug, Clone)]
pub struct SimulatedMassSensor {
    grams: Vec<f64>,
    index: usize,
    divisor: f64,
    tare: TareBehavior,
}

impl SimulatedMassSensor {
    /// `divisor` is the grams-to-raw scale the reader divides by.
    pub fn new(grams: Vec<f64>, divisor: f64) -> Self {
        let grams = if grams.is_empty() { vec![0.0] } else { grams };
        Self {
            grams,
            index: 0,
            divisor,
            tare: TareBehavior::Ok,
        }
    }

    pub fn with_tare(mut self, tare: TareBehavior) -> Self {
        self.tare = tare;
        self
    }
}

impl MassSensor for SimulatedMassSensor {
    fn tare(&mut self) -> Result<(), BoxError> {
        match self.tare {
            TareBehavior::Ok => Ok(()),
            TareBehavior::Hang(d) => {
                std::thread::sleep(d);
                Ok(())
            }
            TareBehavior::Fail => Err(Box::new(HwError::NotResponding("load cell"))),
        }
    }

    fn read_raw(&mut self, _sample_count: u32) -> Result<f64, BoxError> {
        let g = self.grams[self.index % self.grams.len()];
        self.index = (self.index + 1) % self.grams.len();
        Ok(g * self.divisor)
    }
}

/// Shared record of every command a simulated servo received.
#[derive(Debug, Clone, Default)]
pub struct ServoLog(Arc<Mutex<ServoLogInner>>);

#[derive(Debug, Default)]
struct ServoLogInner {
    angles: Vec<f32>,
    releases: usize,
}

impl ServoLog {
    pub fn angles(&self) -> Vec<f32> {
        self.0.lock().map(|g| g.angles.clone()).unwrap_or_default()
    }

    pub fn last_angle(&self) -> Option<f32> {
        self.0.lock().ok().and_then(|g| g.angles.last().copied())
    }

    pub fn releases(&self) -> usize {
        self.0.lock().map(|g| g.releases).unwrap_or(0)
    }
}

/// Servo that records commanded angles. Optionally refuses one angle.
#[derive(Debug, Clone, Default)]
pub struct SimulatedServo {
    log: ServoLog,
    fail_at: Option<f32>,
}

impl SimulatedServo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `set_angle(angle)` returns an error.
    pub fn failing_at(mut self, angle: f32) -> Self {
        self.fail_at = Some(angle);
        self
    }

    pub fn log(&self) -> ServoLog {
        self.log.clone()
    }
}

impl Servo for SimulatedServo {
    fn set_angle(&mut self, degrees: f32) -> Result<(), BoxError> {
        if self.fail_at.is_some_and(|a| (a - degrees).abs() < f32::EPSILON) {
            return Err(Box::new(HwError::NotResponding("servo")));
        }
        if let Ok(mut g) = self.log.0.lock() {
            g.angles.push(degrees);
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), BoxError> {
        if let Ok(mut g) = self.log.0.lock() {
            g.releases += 1;
        }
        Ok(())
    }
}

/// Presence input replaying a level script, one level per poll.
///
/// With `repeat` the script loops; otherwise the last level sticks.
#[derive(Debug, Clone)]
pub struct SimulatedPresence {
    levels: Vec<bool>,
    index: usize,
    repeat: bool,
}

impl SimulatedPresence {
    pub fn from_levels(levels: Vec<bool>, repeat: bool) -> Self {
        let levels = if levels.is_empty() { vec![false] } else { levels };
        Self {
            levels,
            index: 0,
            repeat,
        }
    }

    /// `on` polls active followed by `off` polls idle, looping.
    pub fn periodic(on: usize, off: usize) -> Self {
        let mut levels = vec![true; on];
        levels.extend(std::iter::repeat_n(false, off));
        Self::from_levels(levels, true)
    }
}

impl PresenceSensor for SimulatedPresence {
    fn read_digital(&mut self) -> Result<bool, BoxError> {
        let level = self.levels[self.index.min(self.levels.len() - 1)];
        self.index += 1;
        if self.repeat && self.index >= self.levels.len() {
            self.index = 0;
        }
        Ok(level)
    }
}

/// Indicator that records the (good, bad) lamp state after every change.
#[derive(Debug, Clone, Default)]
pub struct SimulatedIndicator {
    states: Arc<Mutex<Vec<(bool, bool)>>>,
}

impl SimulatedIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<(bool, bool)> {
        self.states.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl Indicator for SimulatedIndicator {
    fn show(&mut self, good: bool, bad: bool) -> Result<(), BoxError> {
        if let Ok(mut g) = self.states.lock() {
            g.push((good, bad));
        }
        Ok(())
    }
}

//! Capability traits at the hardware seam of the bean sorter.
//!
//! Every device the decision engine talks to is reached through one of these
//! traits. Errors cross the boundary as `Box<dyn Error + Send + Sync>` so that
//! simulated, Raspberry Pi and test implementations can use their own error types.
pub mod clock;

pub use clock::{Clock, MonotonicClock, TestClock};

use std::time::Duration;

/// Boxed error used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Optical filter selected on the colour sensor. Only one can be active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Clear,
}

impl Channel {
    /// The three colour channels in the order they are measured.
    pub const RGB: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
            Channel::Clear => "clear",
        }
    }
}

/// Frequency-output colour sensor (TCS3200 class).
pub trait ColorSensor {
    /// Drive the filter-select lines. Callers wait for the filter to settle.
    fn select_channel(&mut self, channel: Channel) -> Result<(), BoxError>;

    /// Count edges on the output line for `window` and return edges per second.
    /// A line that never transitions legitimately yields 0.0.
    fn count_edges(&mut self, window: Duration) -> Result<f64, BoxError>;
}

/// Load cell behind an ADC (HX711 class).
pub trait MassSensor {
    /// Capture the current load as the zero point.
    fn tare(&mut self) -> Result<(), BoxError>;

    /// Mean of `sample_count` tared raw readings. Scaling to grams is the caller's job.
    fn read_raw(&mut self, sample_count: u32) -> Result<f64, BoxError>;
}

/// Angle-commanded diverter servo.
pub trait Servo {
    fn set_angle(&mut self, degrees: f32) -> Result<(), BoxError>;

    /// Stop driving the control signal (no holding torque, no jitter).
    fn release(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Digital proximity input. Implementations resolve polarity.
pub trait PresenceSensor {
    /// `true` when an object is in front of the sensor.
    fn read_digital(&mut self) -> Result<bool, BoxError>;
}

/// Operator-facing accept/reject lamps.
pub trait Indicator {
    fn show(&mut self, good: bool, bad: bool) -> Result<(), BoxError>;

    fn clear(&mut self) -> Result<(), BoxError> {
        self.show(false, false)
    }
}

/// Externally trained classifier consulted with (r, g, b, weight).
///
/// Must be deterministic: identical input yields identical output.
/// Returns 1 for a good bean and 0 for a bad one.
pub trait BeanModel {
    fn predict(&self, r: f64, g: f64, b: f64, weight: f64) -> Result<u8, BoxError>;
}

/// Remote counter sink. Called from a background worker, never from the sort loop.
pub trait TelemetrySink {
    fn push(&mut self, good_count: u64, bad_count: u64, avg_weight_g: f64)
    -> Result<(), BoxError>;
}

impl<T: ColorSensor + ?Sized> ColorSensor for Box<T> {
    fn select_channel(&mut self, channel: Channel) -> Result<(), BoxError> {
        (**self).select_channel(channel)
    }
    fn count_edges(&mut self, window: Duration) -> Result<f64, BoxError> {
        (**self).count_edges(window)
    }
}

impl<T: MassSensor + ?Sized> MassSensor for Box<T> {
    fn tare(&mut self) -> Result<(), BoxError> {
        (**self).tare()
    }
    fn read_raw(&mut self, sample_count: u32) -> Result<f64, BoxError> {
        (**self).read_raw(sample_count)
    }
}

impl<T: Servo + ?Sized> Servo for Box<T> {
    fn set_angle(&mut self, degrees: f32) -> Result<(), BoxError> {
        (**self).set_angle(degrees)
    }
    fn release(&mut self) -> Result<(), BoxError> {
        (**self).release()
    }
}

impl<T: PresenceSensor + ?Sized> PresenceSensor for Box<T> {
    fn read_digital(&mut self) -> Result<bool, BoxError> {
        (**self).read_digital()
    }
}

impl<T: Indicator + ?Sized> Indicator for Box<T> {
    fn show(&mut self, good: bool, bad: bool) -> Result<(), BoxError> {
        (**self).show(good, bad)
    }
    fn clear(&mut self) -> Result<(), BoxError> {
        (**self).clear()
    }
}

impl<T: BeanModel + ?Sized> BeanModel for Box<T> {
    fn predict(&self, r: f64, g: f64, b: f64, weight: f64) -> Result<u8, BoxError> {
        (**self).predict(r, g, b, weight)
    }
}

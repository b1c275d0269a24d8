//! Device layer for the bean sorter.
//!
//! `sim` is always available. The Raspberry Pi drivers (TCS3200, HX711,
//! PWM servo, IR input, LEDs) are compiled with the `hardware` feature.
pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod gpio;
#[cfg(feature = "hardware")]
pub mod hx711;
#[cfg(feature = "hardware")]
pub mod servo;
#[cfg(feature = "hardware")]
pub mod tcs3200;

pub use error::HwError;
pub use sim::{
    ServoLog, SimulatedColorSensor, SimulatedIndicator, SimulatedMassSensor, SimulatedPresence,
    SimulatedServo, TareBehavior,
};

#[cfg(feature = "hardware")]
pub mod hardware {
    pub use crate::gpio::{IrPresence, Leds};
    pub use crate::hx711::Hx711;
    pub use crate::servo::PwmServo;
    pub use crate::tcs3200::{FrequencyScaling, Tcs3200};
}

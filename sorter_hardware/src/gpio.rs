use rppal::gpio::{Gpio, InputPin, OutputPin};
use sorter_traits::{BoxError, Indicator, PresenceSensor};

use crate::error::Result;

/// IR obstacle sensor on a pulled-up input.
pub struct IrPresence {
    pin: InputPin,
    active_low: bool,
}

impl IrPresence {
    pub fn new(pin: u8, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new()?;
        Ok(Self {
            pin: gpio.get(pin)?.into_input_pullup(),
            active_low,
        })
    }
}

impl PresenceSensor for IrPresence {
    fn read_digital(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self.pin.is_high() != self.active_low)
    }
}

/// Green (accept) and red (reject) status LEDs.
pub struct Leds {
    green: OutputPin,
    red: OutputPin,
}

impl Leds {
    pub fn new(green: u8, red: u8) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut green = gpio.get(green)?.into_output();
        let mut red = gpio.get(red)?.into_output();
        green.set_low();
        red.set_low();
        Ok(Self { green, red })
    }
}

impl Indicator for Leds {
    fn show(&mut self, good: bool, bad: bool) -> std::result::Result<(), BoxError> {
        drive(&mut self.green, good);
        drive(&mut self.red, bad);
        Ok(())
    }
}

#[inline]
pub(crate) fn drive(pin: &mut OutputPin, high: bool) {
    if high {
        pin.set_high();
    } else {
        pin.set_low();
    }
}

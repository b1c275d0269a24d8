use rppal::gpio::{Gpio, OutputPin};
use sorter_traits::{BoxError, Servo};

use crate::error::{HwError, Result};
use crate::util::servo_duty_percent;

const SERVO_PWM_HZ: f64 = 50.0;

/// Hobby servo driven by software PWM on a GPIO line.
pub struct PwmServo {
    pin: OutputPin,
}

impl PwmServo {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut pin = gpio.get(pin)?.into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl Servo for PwmServo {
    fn set_angle(&mut self, degrees: f32) -> std::result::Result<(), BoxError> {
        let duty = servo_duty_percent(degrees) / 100.0;
        self.pin
            .set_pwm_frequency(SERVO_PWM_HZ, duty)
            .map_err(HwError::from)?;
        tracing::trace!(degrees, duty, "servo pwm set");
        Ok(())
    }

    fn release(&mut self) -> std::result::Result<(), BoxError> {
        self.pin.clear_pwm().map_err(HwError::from)?;
        self.pin.set_low();
        Ok(())
    }
}

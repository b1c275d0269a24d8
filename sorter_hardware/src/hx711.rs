use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use sorter_traits::{BoxError, MassSensor};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_until_low_with_timeout;

/// Bit-banged HX711 24-bit load cell ADC.
pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
    read_timeout: Duration,
    sample_delay: Duration,
    offset: f64,
}

impl Hx711 {
    /// Claim the DT/SCK pins. Channel A, gain 128 is `gain_pulses = 25`.
    pub fn new(
        dt_pin: u8,
        sck_pin: u8,
        gain_pulses: u8,
        read_timeout: Duration,
        sample_delay: Duration,
    ) -> Result<Self> {
        if !(25..=27).contains(&gain_pulses) {
            return Err(HwError::InvalidArgument(format!(
                "hx711 gain pulses must be 25..=27, got {gain_pulses}"
            )));
        }
        let gpio = Gpio::new()?;
        let dt = gpio.get(dt_pin)?.into_input();
        let mut sck = gpio.get(sck_pin)?.into_output();
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses,
            read_timeout,
            sample_delay,
            offset: 0.0,
        })
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))?;

        // Clock out 24 bits
        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Extra pulses select gain/channel for the next conversion
        for _ in 0..(self.gain_pulses - 24) {
            self.sck.set_high();
            spin_delay_100ns();
            self.sck.set_low();
            spin_delay_100ns();
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }

    fn mean_raw(&mut self, samples: u32) -> Result<f64> {
        let n = samples.max(1);
        let mut sum = 0.0f64;
        for i in 0..n {
            sum += f64::from(self.read_with_timeout(self.read_timeout)?);
            if i + 1 < n && !self.sample_delay.is_zero() {
                std::thread::sleep(self.sample_delay);
            }
        }
        Ok(sum / f64::from(n))
    }
}

impl MassSensor for Hx711 {
    fn tare(&mut self) -> std::result::Result<(), BoxError> {
        self.offset = self.mean_raw(10)?;
        tracing::debug!(offset = self.offset, "hx711 tared");
        Ok(())
    }

    fn read_raw(&mut self, sample_count: u32) -> std::result::Result<f64, BoxError> {
        Ok(self.mean_raw(sample_count)? - self.offset)
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}

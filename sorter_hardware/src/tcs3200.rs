use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use sorter_traits::{BoxError, Channel, ColorSensor};

use crate::error::Result;
use crate::gpio::drive;
use crate::util::count_rising_edges;

/// Output frequency scaling selected through S0/S1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyScaling {
    Off,
    Two,
    #[default]
    Twenty,
    Hundred,
}

impl FrequencyScaling {
    /// (S0, S1) levels.
    fn levels(self) -> (bool, bool) {
        match self {
            FrequencyScaling::Off => (false, false),
            FrequencyScaling::Two => (false, true),
            FrequencyScaling::Twenty => (true, false),
            FrequencyScaling::Hundred => (true, true),
        }
    }
}

/// (S2, S3) levels selecting the photodiode filter.
fn filter_levels(channel: Channel) -> (bool, bool) {
    match channel {
        Channel::Red => (false, false),
        Channel::Green => (true, true),
        Channel::Blue => (false, true),
        Channel::Clear => (true, false),
    }
}

/// TCS3200 light-to-frequency colour sensor.
pub struct Tcs3200 {
    s2: OutputPin,
    s3: OutputPin,
    out: InputPin,
    // held so the scaling lines keep their level
    _s0: OutputPin,
    _s1: OutputPin,
}

impl Tcs3200 {
    pub fn new(
        s0: u8,
        s1: u8,
        s2: u8,
        s3: u8,
        out: u8,
        scaling: FrequencyScaling,
    ) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut s0 = gpio.get(s0)?.into_output();
        let mut s1 = gpio.get(s1)?.into_output();
        let (l0, l1) = scaling.levels();
        drive(&mut s0, l0);
        drive(&mut s1, l1);
        Ok(Self {
            s2: gpio.get(s2)?.into_output(),
            s3: gpio.get(s3)?.into_output(),
            out: gpio.get(out)?.into_input(),
            _s0: s0,
            _s1: s1,
        })
    }
}

impl ColorSensor for Tcs3200 {
    fn select_channel(&mut self, channel: Channel) -> std::result::Result<(), BoxError> {
        let (l2, l3) = filter_levels(channel);
        drive(&mut self.s2, l2);
        drive(&mut self.s3, l3);
        Ok(())
    }

    fn count_edges(&mut self, window: Duration) -> std::result::Result<f64, BoxError> {
        let out = &self.out;
        let rate = count_rising_edges(|| out.is_high(), window);
        tracing::trace!(rate, "tcs3200 edge rate");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_match_datasheet_table() {
        assert_eq!(filter_levels(Channel::Red), (false, false));
        assert_eq!(filter_levels(Channel::Green), (true, true));
        assert_eq!(filter_levels(Channel::Blue), (false, true));
        assert_eq!(filter_levels(Channel::Clear), (true, false));
    }

    #[test]
    fn scaling_levels() {
        assert_eq!(FrequencyScaling::Hundred.levels(), (true, true));
        assert_eq!(FrequencyScaling::Twenty.levels(), (true, false));
        assert_eq!(FrequencyScaling::Two.levels(), (false, true));
    }
}

//! Colour and weight acquisition.
//!
//! R, G and B are measured strictly in sequence: the optical filter is a single
//! shared resource, and every switch is followed by the settle delay.

use std::time::Duration;

use crossbeam_channel as xch;
use sorter_traits::{Channel, Clock, ColorSensor, MassSensor};

use crate::config::{ReaderCfg, WeightCfg};
use crate::error::Result;
use crate::hw_error::hw_report;
use crate::types::{Rgb, WeightSource};

/// One channel's intensity. `anomalous` means the sensor produced a
/// non-finite or negative rate that was clamped to 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    pub intensity: f64,
    pub anomalous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSample {
    pub rgb: Rgb,
    pub anomalous: bool,
}

pub struct ColorReader {
    sensor: Box<dyn ColorSensor + Send>,
    cfg: ReaderCfg,
}

impl ColorReader {
    pub fn new(sensor: Box<dyn ColorSensor + Send>, cfg: ReaderCfg) -> Self {
        Self { sensor, cfg }
    }

    pub fn cfg(&self) -> &ReaderCfg {
        &self.cfg
    }

    pub fn measure_channel(&mut self, channel: Channel, clock: &dyn Clock) -> Result<ChannelReading> {
        self.sensor
            .select_channel(channel)
            .map_err(|e| hw_report(&e, "select colour filter"))?;
        clock.sleep_ms(self.cfg.settle_ms);

        let window = Duration::from_millis(self.cfg.window_ms);
        let n = self.cfg.samples_per_channel.max(1);
        let mut sum = 0.0;
        for _ in 0..n {
            sum += self
                .sensor
                .count_edges(window)
                .map_err(|e| hw_report(&e, "count colour edges"))?;
        }
        let intensity = sum / f64::from(n) * self.cfg.intensity_scale;
        tracing::trace!(channel = channel.name(), intensity, "channel measured");

        if !intensity.is_finite() || intensity < 0.0 {
            tracing::warn!(channel = channel.name(), intensity, "implausible reading clamped");
            return Ok(ChannelReading {
                intensity: 0.0,
                anomalous: true,
            });
        }
        Ok(ChannelReading {
            intensity,
            anomalous: false,
        })
    }

    pub fn measure_rgb(&mut self, clock: &dyn Clock) -> Result<ColorSample> {
        let r = self.measure_channel(Channel::Red, clock)?;
        let g = self.measure_channel(Channel::Green, clock)?;
        let b = self.measure_channel(Channel::Blue, clock)?;
        let rgb = Rgb::new(r.intensity, g.intensity, b.intensity);
        tracing::debug!(r = rgb.r, g = rgb.g, b = rgb.b, "colour measured");
        Ok(ColorSample {
            rgb,
            anomalous: r.anomalous || g.anomalous || b.anomalous,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightReading {
    pub grams: f64,
    pub source: WeightSource,
}

/// The load cell, either live or replaced by a fixed default.
pub enum WeightChannel {
    Live {
        sensor: Box<dyn MassSensor + Send>,
        cfg: WeightCfg,
    },
    Degraded {
        cfg: WeightCfg,
        reason: String,
    },
}

impl std::fmt::Debug for WeightChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightChannel::Live { .. } => f.write_str("WeightChannel::Live"),
            WeightChannel::Degraded { reason, .. } => {
                write!(f, "WeightChannel::Degraded({reason})")
            }
        }
    }
}

impl WeightChannel {
    /// Tare the load cell on a helper thread, waiting at most `init_timeout_ms`.
    ///
    /// A sensor that errors or does not answer in time is abandoned and the
    /// channel starts degraded. Never blocks longer than the timeout.
    ///
    /// On timeout the helper thread is detached, not joined. It keeps the
    /// sensor until `tare` returns and then drops it; a tare that never returns
    /// leaks both the thread and the sensor for the life of the process.
    pub fn start(sensor: Box<dyn MassSensor + Send>, cfg: WeightCfg) -> Self {
        if !cfg.enabled {
            return Self::disabled(cfg);
        }
        let (tx, rx) = xch::bounded(1);
        let spawned = std::thread::Builder::new()
            .name("loadcell-init".into())
            .spawn(move || {
                let mut sensor = sensor;
                let res = sensor.tare().map_err(|e| e.to_string());
                // Receiver is gone if we already timed out
                let _ = tx.send((sensor, res));
            });
        if let Err(e) = spawned {
            return Self::degraded(cfg, format!("could not start load cell init: {e}"));
        }

        let timeout = Duration::from_millis(cfg.init_timeout_ms);
        match rx.recv_timeout(timeout) {
            Ok((sensor, Ok(()))) => {
                tracing::info!("load cell tared");
                WeightChannel::Live { sensor, cfg }
            }
            Ok((_, Err(e))) => Self::degraded(cfg, format!("load cell init failed: {e}")),
            Err(_) => Self::degraded(
                cfg.clone(),
                format!("load cell did not respond within {} ms", cfg.init_timeout_ms),
            ),
        }
    }

    pub fn disabled(cfg: WeightCfg) -> Self {
        Self::degraded(cfg, "weight sensing disabled".into())
    }

    pub(crate) fn degraded(cfg: WeightCfg, reason: String) -> Self {
        tracing::warn!(
            reason = %reason,
            default_weight_g = cfg.default_weight_g,
            "weight channel degraded; using default weight"
        );
        WeightChannel::Degraded { cfg, reason }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, WeightChannel::Degraded { .. })
    }

    pub fn cfg(&self) -> &WeightCfg {
        match self {
            WeightChannel::Live { cfg, .. } | WeightChannel::Degraded { cfg, .. } => cfg,
        }
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            WeightChannel::Degraded { reason, .. } => Some(reason),
            WeightChannel::Live { .. } => None,
        }
    }

    /// Read one bean. Never fails: a load cell error yields the default weight
    /// marked `Failed`.
    pub fn read(&mut self) -> WeightReading {
        match self {
            WeightChannel::Degraded { cfg, .. } => WeightReading {
                grams: cfg.default_weight_g,
                source: WeightSource::Default,
            },
            WeightChannel::Live { sensor, cfg } => match sensor.read_raw(cfg.sample_count) {
                Ok(raw) => {
                    let grams = raw / cfg.scale_divisor;
                    tracing::trace!(raw, grams, "weight measured");
                    WeightReading {
                        grams,
                        source: WeightSource::Measured,
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "load cell read failed");
                    WeightReading {
                        grams: cfg.default_weight_g,
                        source: WeightSource::Failed,
                    }
                }
            },
        }
    }
}

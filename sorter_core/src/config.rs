//! Runtime configuration for the sort engine.
//!
//! These are the structs `Sorter` runs on. They are separate from the
//! TOML-deserialized config in `sorter_config`; see `conversions`.

/// Colour reader timing.
#[derive(Debug, Clone)]
pub struct ReaderCfg {
    /// Edge counting window per channel (ms).
    pub window_ms: u64,
    /// Filter settle after each channel switch (ms).
    pub settle_ms: u64,
    /// Windows averaged per channel.
    pub samples_per_channel: u32,
    /// Multiplier applied to every rate.
    pub intensity_scale: f64,
}

impl Default for ReaderCfg {
    fn default() -> Self {
        Self {
            window_ms: 50,
            settle_ms: 100,
            samples_per_channel: 1,
            intensity_scale: 1.0,
        }
    }
}

/// Load cell channel and weight gate.
#[derive(Debug, Clone)]
pub struct WeightCfg {
    pub enabled: bool,
    /// grams = raw / scale_divisor
    pub scale_divisor: f64,
    pub sample_count: u32,
    pub init_timeout_ms: u64,
    pub default_weight_g: f64,
    /// Inclusive acceptance range (grams).
    pub min_g: f64,
    pub max_g: f64,
}

impl Default for WeightCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            scale_divisor: -0.01,
            sample_count: 5,
            init_timeout_ms: 3000,
            default_weight_g: 0.25,
            min_g: 0.1,
            max_g: 0.5,
        }
    }
}

impl WeightCfg {
    pub fn accepts(&self, grams: f64) -> bool {
        (self.min_g..=self.max_g).contains(&grams)
    }
}

/// Diverter positions and timing.
#[derive(Debug, Clone)]
pub struct ActuatorCfg {
    pub home_deg: f32,
    pub good_deg: f32,
    pub bad_deg: f32,
    pub move_delay_ms: u64,
    pub hold_ms: u64,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            home_deg: 90.0,
            good_deg: 45.0,
            bad_deg: 135.0,
            move_delay_ms: 500,
            hold_ms: 1000,
        }
    }
}

/// Presence debounce; polarity is resolved by the sensor.
#[derive(Debug, Clone)]
pub struct PresenceCfg {
    pub debounce_ms: u64,
    pub poll_ms: u64,
}

impl Default for PresenceCfg {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            poll_ms: 10,
        }
    }
}

/// Orchestrator bookkeeping.
#[derive(Debug, Clone)]
pub struct RunnerCfg {
    /// Sort events kept in memory.
    pub history_len: usize,
    /// Submit a telemetry snapshot every N beans.
    pub telemetry_every_n: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            history_len: 1000,
            telemetry_every_n: 10,
        }
    }
}

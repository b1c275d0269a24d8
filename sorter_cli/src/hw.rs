//! Device assembly: Raspberry Pi drivers with the `hardware` feature, the
//! simulated rig otherwise.
//!
//! The simulated rig can be steered through the environment, which is how
//! the integration tests drive full sessions:
//!
//! - `SORTER_SIM_BEANS="r,g,b;r,g,b"` colour rates replayed per bean
//! - `SORTER_SIM_WEIGHTS="0.3,0.9"` bean masses in grams
//! - `SORTER_SIM_TARE="ok" | "fail" | "hang:MS"` load cell start-up behaviour
//! - `SORTER_SIM_PRESENCE="ON,OFF"` IR polls active, then idle
//! - `SORTER_SIM_SERVO_FAIL="DEG"` servo refuses this angle

use eyre::{Result, WrapErr};
use sorter_traits::{ColorSensor, Indicator, MassSensor, PresenceSensor, Servo};

/// Every device the sorter may drive.
pub struct Rig {
    pub color: Box<dyn ColorSensor + Send>,
    pub servo: Box<dyn Servo + Send>,
    /// `None` when weighing is disabled.
    pub mass: Option<Box<dyn MassSensor + Send>>,
    pub presence: Box<dyn PresenceSensor + Send>,
    pub indicator: Option<Box<dyn Indicator + Send>>,
    pub simulated: bool,
}

#[cfg(feature = "hardware")]
pub fn open(cfg: &sorter_config::Config) -> Result<Rig> {
    use sorter_hardware::hardware::{FrequencyScaling, Hx711, IrPresence, Leds, PwmServo, Tcs3200};
    use std::time::Duration;

    let p = &cfg.pins;
    let scaling = match cfg.color.frequency_scaling.as_str() {
        "off" => FrequencyScaling::Off,
        "2%" => FrequencyScaling::Two,
        "20%" => FrequencyScaling::Twenty,
        _ => FrequencyScaling::Hundred,
    };
    let color = Tcs3200::new(
        p.color_s0,
        p.color_s1,
        p.color_s2,
        p.color_s3,
        p.color_out,
        scaling,
    )
    .wrap_err("open colour sensor pins")?;
    let servo = PwmServo::new(p.servo).wrap_err("open servo pin")?;
    let presence =
        IrPresence::new(p.ir_sensor, cfg.presence.active_low).wrap_err("open IR sensor pin")?;

    // A load cell that cannot even claim its pins degrades like one that never answers.
    let mass: Option<Box<dyn MassSensor + Send>> = if cfg.weight.enabled {
        match Hx711::new(
            p.loadcell_dt,
            p.loadcell_sck,
            cfg.hardware.hx711_gain_pulses,
            Duration::from_millis(cfg.hardware.sensor_read_timeout_ms),
            Duration::from_millis(cfg.weight.sample_delay_ms),
        ) {
            Ok(h) => Some(Box::new(h)),
            Err(e) => {
                tracing::warn!(error = %e, "open hx711 failed; weight channel will be degraded");
                None
            }
        }
    } else {
        None
    };

    let indicator: Option<Box<dyn Indicator + Send>> = match (p.led_green, p.led_red) {
        (Some(g), Some(r)) => match Leds::new(g, r) {
            Ok(l) => Some(Box::new(l)),
            Err(e) => {
                tracing::warn!(error = %e, "indicator LEDs unavailable");
                None
            }
        },
        _ => None,
    };

    Ok(Rig {
        color: Box::new(color),
        servo: Box::new(servo),
        mass,
        presence: Box::new(presence),
        indicator,
        simulated: false,
    })
}

#[cfg(not(feature = "hardware"))]
pub fn open(cfg: &sorter_config::Config) -> Result<Rig> {
    use sorter_hardware::{
        SimulatedColorSensor, SimulatedIndicator, SimulatedMassSensor, SimulatedPresence,
        SimulatedServo,
    };

    let beans = match std::env::var("SORTER_SIM_BEANS") {
        Ok(s) => parse_beans(&s).wrap_err("SORTER_SIM_BEANS")?,
        // A good and a bad bean, alternating
        Err(_) => vec![[5616.0, 78_890.0, 15_887.0], [5401.0, 76_952.0, 15_366.0]],
    };
    let weights = match std::env::var("SORTER_SIM_WEIGHTS") {
        Ok(s) => parse_list(&s).wrap_err("SORTER_SIM_WEIGHTS")?,
        Err(_) => vec![0.3],
    };
    let tare = match std::env::var("SORTER_SIM_TARE") {
        Ok(s) => parse_tare(&s)?,
        Err(_) => sorter_hardware::TareBehavior::Ok,
    };
    let presence = match std::env::var("SORTER_SIM_PRESENCE") {
        Ok(s) => {
            let v = parse_list(&s).wrap_err("SORTER_SIM_PRESENCE")?;
            let [on, off] = v.as_slice() else {
                eyre::bail!("SORTER_SIM_PRESENCE must be ON,OFF poll counts");
            };
            SimulatedPresence::periodic(*on as usize, *off as usize)
        }
        Err(_) => SimulatedPresence::periodic(60, 40),
    };
    let mut servo = SimulatedServo::new();
    if let Ok(s) = std::env::var("SORTER_SIM_SERVO_FAIL") {
        let deg: f32 = s
            .trim()
            .parse()
            .wrap_err("SORTER_SIM_SERVO_FAIL must be an angle")?;
        servo = servo.failing_at(deg);
    }

    let mass: Option<Box<dyn MassSensor + Send>> = if cfg.weight.enabled {
        Some(Box::new(
            SimulatedMassSensor::new(weights, cfg.weight.scale_divisor).with_tare(tare),
        ))
    } else {
        None
    };

    tracing::info!(beans = beans.len(), "using simulated hardware");
    Ok(Rig {
        color: Box::new(SimulatedColorSensor::new(beans)),
        servo: Box::new(servo),
        mass,
        presence: Box::new(presence),
        indicator: Some(Box::new(SimulatedIndicator::new())),
        simulated: true,
    })
}

#[cfg_attr(feature = "hardware", allow(dead_code))]
fn parse_list(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .filter(|t| !t.trim().is_empty())
        .map(|t| {
            t.trim()
                .parse::<f64>()
                .wrap_err_with(|| format!("not a number: {t:?}"))
        })
        .collect()
}

#[cfg_attr(feature = "hardware", allow(dead_code))]
fn parse_beans(s: &str) -> Result<Vec<[f64; 3]>> {
    s.split(';')
        .filter(|t| !t.trim().is_empty())
        .map(|bean| {
            let v = parse_list(bean)?;
            match v.as_slice() {
                [r, g, b] => Ok([*r, *g, *b]),
                _ => Err(eyre::eyre!("bean {bean:?} must be r,g,b")),
            }
        })
        .collect()
}

#[cfg_attr(feature = "hardware", allow(dead_code))]
fn parse_tare(s: &str) -> Result<sorter_hardware::TareBehavior> {
    use sorter_hardware::TareBehavior;
    let s = s.trim();
    match s {
        "ok" => Ok(TareBehavior::Ok),
        "fail" => Ok(TareBehavior::Fail),
        _ => {
            let ms = s
                .strip_prefix("hang:")
                .and_then(|ms| ms.parse::<u64>().ok())
                .ok_or_else(|| eyre::eyre!("SORTER_SIM_TARE must be ok, fail or hang:MS"))?;
            Ok(TareBehavior::Hang(std::time::Duration::from_millis(ms)))
        }
    }
}

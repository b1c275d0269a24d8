//! Type-state builder for `Sorter`.
//!
//! The builder enforces at compile time that a colour sensor, a servo and at
//! least one bean source are provided before `build()` is available.
//! `try_build()` is always available for dynamic checks.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use sorter_traits::{Clock, ColorSensor, Indicator, MassSensor, MonotonicClock, Servo};

use crate::actuator::Actuator;
use crate::calibration::CalibrationProfile;
use crate::classifier::{Classifier, DistanceClassifier};
use crate::config::{ActuatorCfg, PresenceCfg, ReaderCfg, RunnerCfg, WeightCfg};
use crate::error::{BuildError, Result};
use crate::presence::BeanSource;
use crate::reader::{ColorReader, WeightChannel};
use crate::sorter::Sorter;
use crate::stats::SessionStats;
use crate::telemetry::TelemetryWorker;

/// Acceptance radius used when no classifier is configured.
pub const DEFAULT_ACCEPTANCE_RADIUS: f64 = 30.0;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Sorter`. All fields are validated on `build()`.
pub struct SorterBuilder<C, A, B> {
    color: Option<Box<dyn ColorSensor + Send>>,
    servo: Option<Box<dyn Servo + Send>>,
    sources: Vec<Box<dyn BeanSource>>,
    mass: Option<Box<dyn MassSensor + Send>>,
    indicator: Option<Box<dyn Indicator + Send>>,
    classifier: Option<Classifier>,
    profile: Option<Arc<CalibrationProfile>>,
    reader: Option<ReaderCfg>,
    weight: Option<WeightCfg>,
    actuator: Option<ActuatorCfg>,
    presence: Option<PresenceCfg>,
    runner: Option<RunnerCfg>,
    telemetry: Option<TelemetryWorker>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _c: PhantomData<C>,
    _a: PhantomData<A>,
    _b: PhantomData<B>,
}

impl Default for SorterBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            color: None,
            servo: None,
            sources: Vec::new(),
            mass: None,
            indicator: None,
            classifier: None,
            profile: None,
            reader: None,
            weight: None,
            actuator: None,
            presence: None,
            runner: None,
            telemetry: None,
            clock: None,
            _c: PhantomData,
            _a: PhantomData,
            _b: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Validate configuration and assemble a `Sorter`.
///
/// Starts the weight channel (bounded by its init timeout) and parks the
/// diverter at HOME so the first cycle begins from a known state.
#[allow(clippy::too_many_arguments)]
fn validate_and_build(
    color: Box<dyn ColorSensor + Send>,
    servo: Box<dyn Servo + Send>,
    sources: Vec<Box<dyn BeanSource>>,
    mass: Option<Box<dyn MassSensor + Send>>,
    indicator: Option<Box<dyn Indicator + Send>>,
    classifier: Classifier,
    reader: ReaderCfg,
    weight: WeightCfg,
    actuator: ActuatorCfg,
    presence: PresenceCfg,
    runner: RunnerCfg,
    telemetry: Option<TelemetryWorker>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<Sorter> {
    // ── Validation ───────────────────────────────────────────────────────────
    if reader.window_ms == 0 {
        return Err(invalid("window_ms must be >= 1"));
    }
    if reader.samples_per_channel == 0 {
        return Err(invalid("samples_per_channel must be >= 1"));
    }
    if !(reader.intensity_scale.is_finite() && reader.intensity_scale > 0.0) {
        return Err(invalid("intensity_scale must be > 0"));
    }
    if !weight.scale_divisor.is_finite() || weight.scale_divisor == 0.0 {
        return Err(invalid("scale_divisor must be non-zero"));
    }
    if weight.sample_count == 0 {
        return Err(invalid("sample_count must be >= 1"));
    }
    if weight.min_g.is_nan() || weight.max_g.is_nan() || weight.min_g > weight.max_g {
        return Err(invalid("min_g must be <= max_g"));
    }
    if presence.poll_ms == 0 {
        return Err(invalid("poll_ms must be >= 1"));
    }
    if runner.history_len == 0 {
        return Err(invalid("history_len must be >= 1"));
    }
    if runner.telemetry_every_n == 0 {
        return Err(invalid("telemetry_every_n must be >= 1"));
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let epoch = clock.now();

    let weight = match mass {
        Some(m) => WeightChannel::start(m, weight),
        None if weight.enabled => WeightChannel::degraded(weight, "no load cell fitted".into()),
        None => WeightChannel::disabled(weight),
    };

    let mut actuator = Actuator::new(servo, actuator);
    actuator.park(&*clock)?;

    let n_sources = sources.len();
    Ok(Sorter {
        color: ColorReader::new(color, reader),
        weight,
        classifier,
        actuator,
        indicator,
        sources,
        exhausted: vec![false; n_sources],
        telemetry,
        presence,
        history: VecDeque::with_capacity(runner.history_len.min(1024)),
        runner,
        stats: SessionStats::new(epoch),
        clock,
        epoch,
        seq: 0,
        last_source_error: None,
        torn_down: false,
    })
}

impl<C, A, B> SorterBuilder<C, A, B> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Sorter> {
        let color = self
            .color
            .ok_or_else(|| eyre::Report::new(BuildError::MissingColorSensor))?;
        let servo = self
            .servo
            .ok_or_else(|| eyre::Report::new(BuildError::MissingServo))?;
        if self.sources.is_empty() {
            return Err(eyre::Report::new(BuildError::MissingSource));
        }
        let classifier = match self.classifier {
            Some(c) => c,
            None => {
                let profile = self.profile.unwrap_or_else(|| Arc::new(CalibrationProfile::default()));
                Classifier::Distance(DistanceClassifier::new(
                    profile,
                    DEFAULT_ACCEPTANCE_RADIUS,
                    None,
                ))
            }
        };

        validate_and_build(
            color,
            servo,
            self.sources,
            self.mass,
            self.indicator,
            classifier,
            self.reader.unwrap_or_default(),
            self.weight.unwrap_or_default(),
            self.actuator.unwrap_or_default(),
            self.presence.unwrap_or_default(),
            self.runner.unwrap_or_default(),
            self.telemetry,
            self.clock,
        )
    }

    fn into_state<C2, A2, B2>(self) -> SorterBuilder<C2, A2, B2> {
        SorterBuilder {
            color: self.color,
            servo: self.servo,
            sources: self.sources,
            mass: self.mass,
            indicator: self.indicator,
            classifier: self.classifier,
            profile: self.profile,
            reader: self.reader,
            weight: self.weight,
            actuator: self.actuator,
            presence: self.presence,
            runner: self.runner,
            telemetry: self.telemetry,
            clock: self.clock,
            _c: PhantomData,
            _a: PhantomData,
            _b: PhantomData,
        }
    }

    /// Add a bean source. Several sources may be combined.
    pub fn with_source(mut self, source: impl BeanSource + 'static) -> SorterBuilder<C, A, Set> {
        self.sources.push(Box::new(source));
        self.into_state()
    }
}

/// Chainable setters that do not affect type-state.
impl<C, A, B> SorterBuilder<C, A, B> {
    /// Optional load cell; without one the weight channel starts degraded.
    pub fn with_mass_sensor(mut self, mass: impl MassSensor + Send + 'static) -> Self {
        self.mass = Some(Box::new(mass));
        self
    }
    pub fn with_indicator(mut self, indicator: impl Indicator + Send + 'static) -> Self {
        self.indicator = Some(Box::new(indicator));
        self
    }
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }
    /// Profile for the default distance classifier; ignored when a classifier is set.
    pub fn with_profile(mut self, profile: Arc<CalibrationProfile>) -> Self {
        self.profile = Some(profile);
        self
    }
    pub fn with_reader(mut self, reader: ReaderCfg) -> Self {
        self.reader = Some(reader);
        self
    }
    pub fn with_weight(mut self, weight: WeightCfg) -> Self {
        self.weight = Some(weight);
        self
    }
    pub fn with_actuator(mut self, actuator: ActuatorCfg) -> Self {
        self.actuator = Some(actuator);
        self
    }
    pub fn with_presence(mut self, presence: PresenceCfg) -> Self {
        self.presence = Some(presence);
        self
    }
    pub fn with_runner(mut self, runner: RunnerCfg) -> Self {
        self.runner = Some(runner);
        self
    }
    pub fn with_telemetry(mut self, worker: TelemetryWorker) -> Self {
        self.telemetry = Some(worker);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<A, B> SorterBuilder<Missing, A, B> {
    pub fn with_color_sensor(
        mut self,
        sensor: impl ColorSensor + Send + 'static,
    ) -> SorterBuilder<Set, A, B> {
        self.color = Some(Box::new(sensor));
        self.into_state()
    }
}

impl<C, B> SorterBuilder<C, Missing, B> {
    pub fn with_servo(mut self, servo: impl Servo + Send + 'static) -> SorterBuilder<C, Set, B> {
        self.servo = Some(Box::new(servo));
        self.into_state()
    }
}

impl SorterBuilder<Set, Set, Set> {
    /// Validate and build the Sorter. Only available when sensor, servo and a source are set.
    pub fn build(self) -> Result<Sorter> {
        self.try_build()
    }
}

#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Bean inspection and sort decision engine (hardware-agnostic).
//!
//! All hardware interactions go through the capability traits in
//! `sorter_traits`. The engine owns its resources explicitly; nothing here
//! touches global state.
//!
//! ## Architecture
//!
//! - **Reader**: sequential R, G, B edge-rate measurement and the load cell
//!   channel with degraded fallback (`reader`)
//! - **Calibration**: reference profile and [0, 100] normalization (`calibration`)
//! - **Classification**: distance, threshold-sum and learned-model strategies
//!   (`classifier`, `model`)
//! - **Bean sources**: debounced presence, manual trigger, timer (`presence`)
//! - **Actuation**: bounded diverter moves that always end at HOME (`actuator`)
//! - **Orchestration**: `Sorter` and its builder; session drivers in `runner`
//! - **Bookkeeping**: `stats` and best-effort `telemetry`

pub mod actuator;
pub mod atomic;
pub mod builder;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod model;
pub mod presence;
pub mod reader;
pub mod runner;
pub mod sorter;
pub mod stats;
pub mod status;
pub mod telemetry;
pub mod types;

pub use actuator::{Actuator, MoveOutcome, Position};
pub use builder::{Missing, Set, SorterBuilder};
pub use calibration::CalibrationProfile;
pub use classifier::{Classifier, DistanceClassifier, DistanceReport, ThresholdSum};
pub use config::{ActuatorCfg, PresenceCfg, ReaderCfg, RunnerCfg, WeightCfg};
pub use conversions::build_classifier;
pub use error::{BuildError, Report, Result, SorterError};
pub use model::DecisionTreeModel;
pub use presence::{BeanSource, ManualSource, Poll, PresenceSource, TimedSource};
pub use reader::{ColorReader, WeightChannel, WeightReading};
pub use runner::{SessionReport, run_actuator_test, run_sensor_test, run_session};
pub use sorter::Sorter;
pub use stats::SessionStats;
pub use status::{SortStatus, StopReason};
pub use telemetry::{TelemetrySnapshot, TelemetryWorker};
pub use types::{
    Detection, Disposition, FeatureVector, Inspection, Rgb, SortEvent, TriggerKind, Verdict,
    WeightSource,
};
